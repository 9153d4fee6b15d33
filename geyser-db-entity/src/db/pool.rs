use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "pool", schema_name = "public")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,
    pub staking_token: String,
    pub reward_token: String,
    pub reward_module: String,
    pub reward_module_type: String,
    pub users: i64,
    pub operations: i64,
    pub staked: Decimal,
    pub rewards: Decimal,
    pub funded: Decimal,
    pub distributed: Decimal,
    pub gysr_spent: Decimal,
    pub gysr_vested: Decimal,
    pub volume: Decimal,
    pub tvl: Decimal,
    pub updated: i64,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
