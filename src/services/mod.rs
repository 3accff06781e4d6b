use sea_orm::TransactionError;

use crate::errors::ServiceError;

pub mod ddt;
pub mod inventory;
pub mod materials;
pub mod site_material;

pub use ddt::DdtService;
pub use inventory::InventoryService;
pub use materials::MaterialCatalogService;
pub use site_material::SiteMaterialService;

/// Flattens sea-orm's transaction error wrapper back into our error type.
pub(crate) fn tx_err(err: TransactionError<ServiceError>) -> ServiceError {
    match err {
        TransactionError::Connection(db_err) => ServiceError::db_error(db_err),
        TransactionError::Transaction(service_err) => service_err,
    }
}

/// Quantities entering the ledger are strictly positive magnitudes.
pub(crate) fn ensure_positive(
    quantity: rust_decimal::Decimal,
    field: &str,
) -> Result<(), ServiceError> {
    if quantity <= rust_decimal::Decimal::ZERO {
        return Err(ServiceError::ValidationError(format!(
            "{} must be greater than zero",
            field
        )));
    }
    Ok(())
}
