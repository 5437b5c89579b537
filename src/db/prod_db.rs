use std::time::Duration;

use crate::db::nem::price_demand_archive::NemPriceDemandArchive;
use crate::interval::month::month;

pub struct ProdDb {}

impl ProdDb {
    pub fn nem_price_demand() -> NemPriceDemandArchive {
        NemPriceDemandArchive {
            base_url: "https://aemo.com.au/aemo/data/nem/priceanddemand".to_string(),
            first_month: month(2022, 1),
            // above the half-hour count of a 29-day month; a 30 or 31 day
            // month can sit below its own full count and still be skipped
            complete_threshold: 1400,
            throttle: Duration::from_secs(1),
        }
    }
}
