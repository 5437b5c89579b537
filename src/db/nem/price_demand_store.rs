use jiff::civil::DateTime;
use log::info;
use mongodb::bson::doc;
use mongodb::error::{ErrorKind, InsertManyError};
use mongodb::options::IndexOptions;
use mongodb::sync::{Client, Collection};
use mongodb::IndexModel;
use thiserror::Error;

use crate::elec::region::Region;
use crate::interval::month::Month;

use super::price_demand_archive::PriceRecord;

pub const DATABASE_NAME: &str = "NEM_Prices";
pub const COLLECTION_NAME: &str = "price_demand";
/// Name of the compound unique index on (SETTLEMENTDATE, REGION).
pub const INDEX_NAME: &str = "SETTLEMENTDATE_1_REGION_1";

/// Server error code for a unique index violation.
const DUPLICATE_KEY: i32 = 11000;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error(transparent)]
    Mongo(#[from] mongodb::error::Error),
    #[error("{0}")]
    Other(String),
}

/// The queries the ingestion job needs from storage.
pub trait PriceStore {
    /// Make sure the (SETTLEMENTDATE, REGION) unique index exists, replacing
    /// any prior definition under the same name.
    fn ensure_unique_index(&self) -> Result<(), StoreError>;

    fn latest_settlement_date(&self) -> Result<Option<DateTime>, StoreError>;

    fn earliest_settlement_date(&self) -> Result<Option<DateTime>, StoreError>;

    /// Number of stored records for this region with a settlement date in
    /// this month.
    fn count_month(&self, region: Region, month: &Month) -> Result<u64, StoreError>;

    /// Unordered insert.  Records already in the store are dropped
    /// individually; returns how many records were actually inserted.
    fn insert_new(&self, records: &[PriceRecord]) -> Result<u64, StoreError>;

    fn total_count(&self) -> Result<u64, StoreError>;
}

pub struct MongoPriceStore {
    collection: Collection<PriceRecord>,
}

impl MongoPriceStore {
    pub fn connect(uri: &str) -> Result<MongoPriceStore, StoreError> {
        let client = Client::with_uri_str(uri)?;
        Ok(MongoPriceStore {
            collection: client.database(DATABASE_NAME).collection(COLLECTION_NAME),
        })
    }

    fn settlement_date_extremum(&self, direction: i32) -> Result<Option<DateTime>, StoreError> {
        let found = self
            .collection
            .find_one(doc! {})
            .sort(doc! { "SETTLEMENTDATE": direction })
            .run()?;
        Ok(found.map(|record| record.settlement_date))
    }
}

impl PriceStore for MongoPriceStore {
    fn ensure_unique_index(&self) -> Result<(), StoreError> {
        // a prior definition under the same name may have different options
        if self.collection.drop_index(INDEX_NAME).run().is_ok() {
            info!("Dropped existing index {}", INDEX_NAME);
        }
        let index = IndexModel::builder()
            .keys(doc! { "SETTLEMENTDATE": 1, "REGION": 1 })
            .options(
                IndexOptions::builder()
                    .unique(true)
                    .name(INDEX_NAME.to_string())
                    .build(),
            )
            .build();
        self.collection.create_index(index).run()?;
        Ok(())
    }

    fn latest_settlement_date(&self) -> Result<Option<DateTime>, StoreError> {
        self.settlement_date_extremum(-1)
    }

    fn earliest_settlement_date(&self) -> Result<Option<DateTime>, StoreError> {
        self.settlement_date_extremum(1)
    }

    fn count_month(&self, region: Region, month: &Month) -> Result<u64, StoreError> {
        let filter = doc! {
            "REGION": region.as_str(),
            "SETTLEMENTDATE": { "$regex": format!("^{}", month) },
        };
        Ok(self.collection.count_documents(filter).run()?)
    }

    fn insert_new(&self, records: &[PriceRecord]) -> Result<u64, StoreError> {
        if records.is_empty() {
            return Ok(0);
        }
        match self.collection.insert_many(records).ordered(false).run() {
            Ok(result) => Ok(result.inserted_ids.len() as u64),
            Err(e) => match *e.kind {
                ErrorKind::InsertMany(ref failure) if only_duplicate_keys(failure) => {
                    Ok(failure.inserted_ids.len() as u64)
                }
                _ => Err(StoreError::Mongo(e)),
            },
        }
    }

    fn total_count(&self) -> Result<u64, StoreError> {
        Ok(self.collection.count_documents(doc! {}).run()?)
    }
}

fn only_duplicate_keys(failure: &InsertManyError) -> bool {
    match &failure.write_errors {
        Some(errors) => errors.iter().all(|e| e.code == DUPLICATE_KEY),
        None => false,
    }
}
