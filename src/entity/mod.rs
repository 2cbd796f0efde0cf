pub mod addresses;
pub mod cart_items;
pub mod notifications;
pub mod order_lines;
pub mod orders;
pub mod payments;
pub mod products;
pub mod stock_movements;
pub mod users;

pub use addresses::Entity as Addresses;
pub use cart_items::Entity as CartItems;
pub use notifications::Entity as Notifications;
pub use order_lines::Entity as OrderLines;
pub use orders::Entity as Orders;
pub use payments::Entity as Payments;
pub use products::Entity as Products;
pub use stock_movements::Entity as StockMovements;
pub use users::Entity as Users;
