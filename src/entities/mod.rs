//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Nested document shapes (menu days, order days, archive snapshots) live in
//! JSON columns next to the entity that owns them.

pub mod archived_order;
pub mod delivery_record;
pub mod menu;
pub mod system_state;
pub mod top_meal;
pub mod unpaid_record;
pub mod user;
pub mod weekly_order;

// Re-export specific types to avoid conflicts
pub use archived_order::{
    Column as ArchivedOrderColumn, Entity as ArchivedOrder, Model as ArchivedOrderModel,
};
pub use delivery_record::{
    Column as DeliveryRecordColumn, Entity as DeliveryRecord, Model as DeliveryRecordModel,
};
pub use menu::{Column as MenuColumn, Entity as Menu, Model as MenuModel};
pub use system_state::{
    Column as SystemStateColumn, Entity as SystemState, Model as SystemStateModel,
};
pub use top_meal::{Column as TopMealColumn, Entity as TopMeal, Model as TopMealModel};
pub use unpaid_record::{
    Column as UnpaidRecordColumn, Entity as UnpaidRecord, Model as UnpaidRecordModel,
};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
pub use weekly_order::{
    Column as WeeklyOrderColumn, Entity as WeeklyOrder, Model as WeeklyOrderModel,
};
