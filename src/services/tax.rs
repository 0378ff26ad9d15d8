use rust_decimal::Decimal;
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::sync::Arc;
use tracing::{instrument, warn};

use crate::{
    entities::{region, Region},
    errors::ServiceError,
};

/// Region tax lookup. Rates are the sum of the region's GST, PST, and HST
/// components; region names are matched exactly (case-sensitive).
#[derive(Clone)]
pub struct TaxService {
    db: Arc<DatabaseConnection>,
}

impl TaxService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Strict lookup used by order creation: a blank name is a
    /// `MissingRegion`, an unmatched name an `InvalidRegion`.
    #[instrument(skip(self))]
    pub async fn resolve(&self, region_name: &str) -> Result<region::Model, ServiceError> {
        if region_name.trim().is_empty() {
            return Err(ServiceError::MissingRegion);
        }
        Region::find()
            .filter(region::Column::Name.eq(region_name))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::InvalidRegion(region_name.to_string()))
    }

    /// Combined tax rate for a region name, used by the quote/preview path.
    ///
    /// An unrecognized name yields rate 0 rather than an error. This fail-open
    /// behavior is intentional and matches the storefront's historic quirk: a
    /// quote against an unknown region silently shows no tax. Checkout itself
    /// goes through `resolve` and rejects unknown regions.
    #[instrument(skip(self))]
    pub async fn rate_for(&self, region_name: &str) -> Result<Decimal, ServiceError> {
        let region = Region::find()
            .filter(region::Column::Name.eq(region_name))
            .one(&*self.db)
            .await?;

        match region {
            Some(region) => Ok(region.rate()),
            None => {
                warn!(region = region_name, "unknown region, quoting tax rate 0");
                Ok(Decimal::ZERO)
            }
        }
    }

    /// All regions ordered by name, for the checkout form dropdown.
    pub async fn list(&self) -> Result<Vec<region::Model>, ServiceError> {
        Ok(Region::find()
            .order_by_asc(region::Column::Name)
            .all(&*self.db)
            .await?)
    }
}
