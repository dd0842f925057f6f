/// Demand a permission on an entity, returning early with
/// `PermissionsError::InsufficientPermissions` if it is not granted.
///
/// The error converts into a 401 response for anonymous callers and a 403
/// response for authenticated ones.
///
/// # Usage
///
/// ```rust,ignore
/// use crudkit::permissions::prelude::*;
///
/// pub async fn show(
///     permissions: OrderPermissions,
///     Path(id): Path<i64>,
/// ) -> Result<Json<OrderDetails>, PermissionsError> {
///     let order = load(id).await;
///     demand!(permissions, &order, &ORDER_READ);
///     Ok(Json(OrderDetails::from(order)))
/// }
/// ```
#[macro_export]
macro_rules! demand {
    ($manager:expr, $entity:expr, $permission:expr) => {{
        use $crate::permissions::PermissionsManager as _;
        if let Err(error) = $manager.demand($entity, $permission).await {
            return Err(error.into());
        }
    }};
}
