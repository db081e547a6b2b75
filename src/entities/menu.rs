//! Weekly menu entity - A dated, priced catalog of meals per weekday.
//!
//! The day/meal structure is stored as a JSON document in the `days` column.
//! Which menu is open for ordering is tracked separately by the active-menu
//! pointer in `system_state`.

use crate::core::weekday::Weekday;
use sea_orm::FromJsonQueryResult;
use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// A single priced meal on a day's menu.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MealOffering {
    /// Meal name; orders refer to meals by this exact string
    pub name: String,
    /// Optional portion weight or short description
    #[serde(default)]
    pub weight: Option<String>,
    /// Unit price
    pub price: f64,
}

/// The meals offered on one weekday.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayMenu {
    pub day: Weekday,
    #[serde(default)]
    pub meals: Vec<MealOffering>,
}

/// JSON column wrapper for the ordered list of day menus.
#[derive(Clone, Debug, PartialEq, Default, Serialize, Deserialize, FromJsonQueryResult)]
pub struct MenuDays(pub Vec<DayMenu>);

impl MenuDays {
    /// Meals offered on `day`, empty if the day is not on the menu.
    #[must_use]
    pub fn meals(&self, day: Weekday) -> &[MealOffering] {
        self.0
            .iter()
            .find(|d| d.day == day)
            .map_or(&[], |d| d.meals.as_slice())
    }

    /// Finds the offering named `name` on `day`.
    #[must_use]
    pub fn offering(&self, day: Weekday, name: &str) -> Option<&MealOffering> {
        self.meals(day).iter().find(|m| m.name == name)
    }
}

/// Weekly menu database model
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "menus")]
#[serde(rename_all = "camelCase")]
pub struct Model {
    /// Unique identifier for the menu
    #[sea_orm(primary_key)]
    pub id: i64,
    /// First school day of the week (calendar date)
    pub week_start: Date,
    /// Last school day of the week (calendar date)
    pub week_end: Date,
    /// Orders are accepted up to and including this instant
    pub order_deadline: DateTimeUtc,
    /// Meals per weekday, in canonical weekday order
    #[sea_orm(column_type = "Json")]
    pub days: MenuDays,
    /// When the menu was published
    pub created_at: DateTimeUtc,
    /// When the menu was last replaced
    pub updated_at: DateTimeUtc,
}

/// Orders reference a menu by id only; there is no foreign key, so orders
/// left behind by a partially failed retirement outlive the menu.
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
