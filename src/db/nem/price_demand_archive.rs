use itertools::Itertools;
use jiff::civil::DateTime;
use jiff::Zoned;
use log::{error, info};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::Display;
use std::thread;
use std::time::Duration;

use crate::elec::region::Region;
use crate::interval::month::Month;

use super::price_demand_store::{PriceStore, StoreError};

/// Timestamp format in the published CSV files.
pub const SOURCE_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";
/// Timestamp format of the SETTLEMENTDATE field in storage.
pub const STORE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One 30-minute settlement interval for one region, as published by AEMO.
/// Serializes with the upstream column names, the settlement date as a
/// `"%Y-%m-%d %H:%M:%S"` string.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PriceRecord {
    #[serde(rename = "SETTLEMENTDATE", with = "store_datetime")]
    pub settlement_date: DateTime,
    #[serde(rename = "REGION")]
    pub region: Region,
    #[serde(rename = "RRP")]
    pub rrp: f64,
    #[serde(rename = "TOTALDEMAND")]
    pub total_demand: f64,
    #[serde(rename = "PERIODTYPE")]
    pub period_type: String,
}

mod store_datetime {
    use jiff::civil::DateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::STORE_TIME_FORMAT;

    pub fn serialize<S: Serializer>(dt: &DateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&dt.strftime(STORE_TIME_FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime, D::Error> {
        let value = String::deserialize(deserializer)?;
        DateTime::strptime(STORE_TIME_FORMAT, &value).map_err(serde::de::Error::custom)
    }
}

/// Failure to retrieve or decode the published file for one region/month.
#[derive(Debug)]
pub struct FetchError {
    pub region: Region,
    pub yearmonth: String,
    pub message: String,
}

impl Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Error processing data for {} {}: {}",
            self.region, self.yearmonth, self.message
        )
    }
}

impl Error for FetchError {}

/// Counters accumulated over one run.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct UpdateStats {
    pub processed: u64,
    pub skipped: u64,
    pub failed: u64,
}

/// A region/month is presumed fully ingested once its record count exceeds
/// the threshold, unless it is the current calendar month which is still
/// accumulating intervals.
pub fn is_complete(existing_count: u64, threshold: u64, month: &Month, current: &Month) -> bool {
    existing_count > threshold && month != current
}

/// Month to resume from: the month of the latest stored settlement date, or
/// `first_month` when the store is empty.
pub fn start_month(latest: Option<&DateTime>, first_month: Month) -> Month {
    match latest {
        Some(dt) => Month::containing(dt.date()),
        None => first_month,
    }
}

#[derive(Clone)]
pub struct NemPriceDemandArchive {
    pub base_url: String,
    /// Earliest month with published data; backfills start here on an empty store.
    pub first_month: Month,
    /// Record count above which a past month is treated as fully loaded.
    pub complete_threshold: u64,
    /// Pause between successive downloads.
    pub throttle: Duration,
}

impl NemPriceDemandArchive {
    /// Name of the published file for one region/month.
    pub fn filename(&self, month: &Month, region: Region) -> String {
        format!("PRICE_AND_DEMAND_{}_{}.csv", month.yearmonth(), region)
    }

    pub fn url(&self, month: &Month, region: Region) -> String {
        format!("{}/{}", self.base_url, self.filename(month, region))
    }

    /// Download and parse the published file for one region/month.
    /// The server rejects requests without browser-like headers.
    pub fn download_month(
        &self,
        month: &Month,
        region: Region,
    ) -> Result<Vec<PriceRecord>, FetchError> {
        let fail = |message: String| FetchError {
            region,
            yearmonth: month.yearmonth(),
            message,
        };

        let client = Client::new();
        let response = client
            .get(self.url(month, region))
            .header(
                USER_AGENT,
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36",
            )
            .header(
                ACCEPT,
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
            )
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.5")
            .send()
            .map_err(|e| fail(e.to_string()))?;
        if response.status() != StatusCode::OK {
            return Err(fail(format!("request returned status {}", response.status())));
        }
        let body = response.text().map_err(|e| fail(e.to_string()))?;

        parse_csv(&body).map_err(|e| fail(e.to_string()))
    }

    /// Bring the store up to date through the current month.  Resumes from the
    /// latest stored settlement date unless a start month is given.
    pub fn update<S: PriceStore>(
        &self,
        store: &S,
        start: Option<Month>,
        regions: &[Region],
    ) -> Result<UpdateStats, StoreError> {
        let current = Month::containing(Zoned::now().date());
        self.update_through(store, current, start, regions, |month, region| {
            self.download_month(month, region)
        })
    }

    /// The region × month loop behind [`update`](Self::update), with the
    /// current month and the fetch step as explicit inputs.
    pub fn update_through<S, F>(
        &self,
        store: &S,
        current: Month,
        start: Option<Month>,
        regions: &[Region],
        fetch: F,
    ) -> Result<UpdateStats, StoreError>
    where
        S: PriceStore,
        F: Fn(&Month, Region) -> Result<Vec<PriceRecord>, FetchError>,
    {
        store.ensure_unique_index()?;

        let start = match start {
            Some(month) => month,
            None => start_month(store.latest_settlement_date()?.as_ref(), self.first_month),
        };
        info!("Updating data from {} to {}", start, current);
        // a store with dates past the current month leaves nothing to do
        let months = start.up_to(&current).unwrap_or_default();

        let mut stats = UpdateStats::default();
        for region in regions {
            info!("Processing region: {}", region);
            for month in &months {
                let existing_count = store.count_month(*region, month)?;
                if is_complete(existing_count, self.complete_threshold, month, &current) {
                    info!(
                        "Skipping {} {} - complete data exists",
                        month.yearmonth(),
                        region
                    );
                    stats.skipped += 1;
                    continue;
                }

                match fetch(month, *region) {
                    Ok(records) => match store.insert_new(&records) {
                        Ok(inserted) => {
                            stats.processed += inserted;
                            if inserted == records.len() as u64 {
                                info!(
                                    "Added {} records for {} {}",
                                    inserted,
                                    region,
                                    month.yearmonth()
                                );
                            } else {
                                info!(
                                    "Partially added {} records for {} {}",
                                    inserted,
                                    region,
                                    month.yearmonth()
                                );
                            }
                        }
                        Err(e) => {
                            error!(
                                "Error inserting data for {} {}: {}",
                                region,
                                month.yearmonth(),
                                e
                            );
                            stats.failed += 1;
                        }
                    },
                    Err(e) => {
                        error!("{}", e);
                        stats.failed += 1;
                    }
                }

                thread::sleep(self.throttle);
            }
        }

        Ok(stats)
    }
}

/// Decode a published CSV body.  Columns are matched by name so extra columns
/// and reordering are tolerated.  Exact-duplicate rows are dropped.
pub fn parse_csv(contents: &str) -> Result<Vec<PriceRecord>, Box<dyn Error>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(contents.as_bytes());

    let headers = rdr.headers()?.clone();
    let i_date = column_index(&headers, "SETTLEMENTDATE")?;
    let i_region = column_index(&headers, "REGION")?;
    let i_rrp = column_index(&headers, "RRP")?;
    let i_demand = column_index(&headers, "TOTALDEMAND")?;
    let i_period = column_index(&headers, "PERIODTYPE")?;

    let mut seen: HashSet<String> = HashSet::new();
    let mut out: Vec<PriceRecord> = Vec::new();
    for result in rdr.records() {
        let record = result?;
        if !seen.insert(record.iter().join(",")) {
            continue;
        }
        out.push(PriceRecord {
            settlement_date: DateTime::strptime(SOURCE_TIME_FORMAT, &record[i_date])?,
            region: record[i_region].parse()?,
            rrp: record[i_rrp].parse()?,
            total_demand: record[i_demand].parse()?,
            period_type: record[i_period].to_owned(),
        });
    }

    Ok(out)
}

fn column_index(headers: &csv::StringRecord, name: &str) -> Result<usize, Box<dyn Error>> {
    match headers.iter().position(|h| h == name) {
        Some(i) => Ok(i),
        None => Err(Box::from(format!("Column {} not found in header row", name))),
    }
}
