//! Orders are read-mostly in the back office: listing, detail, and simple
//! status transitions. Order creation happens in the storefront, not here.

use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};

use crate::domain::ServiceError;
use crate::models::order::{self, Entity as Order, OrderDto};
use crate::models::order_item::{self, Entity as OrderItem, OrderItemDto};
use crate::models::user::Entity as User;

pub const ORDER_STATUSES: [&str; 5] =
    ["pending", "processing", "shipped", "delivered", "cancelled"];

/// Filter parameters for listing orders
#[derive(Debug, Default, Clone)]
pub struct OrderFilter {
    pub status: Option<String>,
    pub customer_id: Option<i32>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub page: u64,
    pub per_page: u64,
}

pub async fn list_orders(
    db: &DatabaseConnection,
    filter: OrderFilter,
) -> Result<(Vec<OrderDto>, u64), ServiceError> {
    let mut condition = Condition::all();

    if let Some(status) = filter.status {
        condition = condition.add(order::Column::Status.eq(status));
    }
    if let Some(customer_id) = filter.customer_id {
        condition = condition.add(order::Column::CustomerId.eq(customer_id));
    }
    if let Some(from) = filter.date_from {
        condition = condition.add(order::Column::CreatedAt.gte(from));
    }
    if let Some(to) = filter.date_to {
        // date-only bound should include the whole day
        condition = condition.add(order::Column::CreatedAt.lt(format!("{}~", to)));
    }

    let per_page = filter.per_page.clamp(1, 200);
    let page = filter.page.max(1);

    let paginator = Order::find()
        .filter(condition)
        .order_by_desc(order::Column::CreatedAt)
        .find_also_related(User)
        .paginate(db, per_page);

    let total = paginator.num_items().await?;
    let orders = paginator.fetch_page(page - 1).await?;

    let result = orders
        .into_iter()
        .map(|(order, customer)| {
            let mut dto = OrderDto::from(order);
            dto.customer_name = customer.map(|c| c.username);
            dto
        })
        .collect();

    Ok((result, total))
}

pub async fn get_order(
    db: &DatabaseConnection,
    id: i32,
) -> Result<(OrderDto, Vec<OrderItemDto>), ServiceError> {
    let order = Order::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    let items = OrderItem::find()
        .filter(order_item::Column::OrderId.eq(id))
        .all(db)
        .await?;

    let customer_name = match order.customer_id {
        Some(customer_id) => User::find_by_id(customer_id)
            .one(db)
            .await?
            .map(|u| u.username),
        None => None,
    };

    let mut dto = OrderDto::from(order);
    dto.customer_name = customer_name;

    Ok((dto, items.into_iter().map(OrderItemDto::from).collect()))
}

/// Set an order's status. Cancelled orders are terminal.
pub async fn update_status(
    db: &DatabaseConnection,
    id: i32,
    status: &str,
) -> Result<OrderDto, ServiceError> {
    if !ORDER_STATUSES.contains(&status) {
        return Err(ServiceError::Validation(format!(
            "invalid order status '{}'",
            status
        )));
    }

    let order = Order::find_by_id(id)
        .one(db)
        .await?
        .ok_or(ServiceError::NotFound)?;

    if order.status == "cancelled" {
        return Err(ServiceError::Validation(
            "a cancelled order cannot change status".to_string(),
        ));
    }

    let mut active: order::ActiveModel = order.into();
    active.status = Set(status.to_string());
    active.updated_at = Set(chrono::Utc::now().to_rfc3339());

    Ok(OrderDto::from(active.update(db).await?))
}
