use sea_orm::entity::prelude::*;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "orders")]
pub struct Model {
    /// Opaque order reference. Generated once, never reassigned.
    #[sea_orm(primary_key)]
    pub id: Uuid,
    /// Nulled when the customer account is deleted; the order is kept.
    pub user_id: Option<Uuid>,
    pub total_amount: i64,
    /// One of `lifecycle::OrderStatus`. Mutated only through guarded transitions.
    pub status: String,
    pub customer_note: String,
    pub ship_to_name: String,
    pub ship_to_phone: String,
    pub ship_to_line: String,
    pub ship_to_city: String,
    pub ship_to_region: String,
    pub ship_to_country: String,
    pub delivered_at: Option<DateTimeWithTimeZone>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    Users,
    #[sea_orm(has_many = "super::order_lines::Entity")]
    OrderLines,
    #[sea_orm(has_one = "super::payments::Entity")]
    Payments,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::order_lines::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::OrderLines.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
