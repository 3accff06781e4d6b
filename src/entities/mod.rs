pub mod ddt;
pub mod ddt_item;
pub mod inventory;
pub mod material;
pub mod site_material;
pub mod stock_movement;
