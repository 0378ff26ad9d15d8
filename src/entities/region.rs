use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A tax jurisdiction with three independent rate components, each a decimal
/// fraction (e.g. 0.05). Names are unique; the admin layer additionally
/// rejects case-insensitive duplicates so exact-match lookup at checkout
/// stays unambiguous.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "regions")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    #[sea_orm(unique)]
    pub name: String,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))", nullable)]
    pub gst: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))", nullable)]
    pub pst: Option<Decimal>,
    #[sea_orm(column_type = "Decimal(Some((8, 5)))", nullable)]
    pub hst: Option<Decimal>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::address::Entity")]
    Addresses,
}

impl Related<super::address::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Addresses.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}

impl Model {
    /// Combined tax rate: gst + pst + hst, null components treated as zero.
    pub fn rate(&self) -> Decimal {
        self.gst.unwrap_or_default() + self.pst.unwrap_or_default() + self.hst.unwrap_or_default()
    }
}
