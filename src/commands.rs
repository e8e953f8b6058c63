use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::OrderError;
use crate::types::{Order, OrderKind, OrderSide, OrderType};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum OrderCommand {
    PlaceOrder(PlaceOrderCommand),
    CancelOrder(CancelOrderCommand),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOrderCommand {
    pub owner: Uuid,
    pub order_type: OrderType,
    pub side: OrderSide,
    pub price: Option<Decimal>,
    pub quantity: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOrderCommand {
    pub order_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Submitted(Uuid),
    /// `false` when the id was unknown or already terminal.
    Canceled(bool),
}

impl TryFrom<PlaceOrderCommand> for Order {
    type Error = OrderError;

    fn try_from(cmd: PlaceOrderCommand) -> Result<Self, Self::Error> {
        let kind = match (cmd.order_type, cmd.price) {
            (OrderType::Limit, Some(price)) => OrderKind::Limit { price },
            (OrderType::Limit, None) => return Err(OrderError::MissingLimitPrice),
            (OrderType::Market, None) => OrderKind::Market,
            (OrderType::Market, Some(_)) => return Err(OrderError::UnexpectedMarketPrice),
        };
        let order = Order::new(cmd.owner, kind, cmd.side, cmd.quantity);
        validate_order(&order)?;
        Ok(order)
    }
}

pub(crate) fn validate_order(order: &Order) -> Result<(), OrderError> {
    if order.quantity() == 0 {
        return Err(OrderError::NonPositiveQuantity);
    }
    match order.kind {
        OrderKind::Limit { price } if price <= Decimal::ZERO => {
            Err(OrderError::NonPositivePrice(price))
        }
        OrderKind::Limit { .. } | OrderKind::Market => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn place(order_type: OrderType, price: Option<Decimal>, quantity: u64) -> PlaceOrderCommand {
        PlaceOrderCommand {
            owner: Uuid::new_v4(),
            order_type,
            side: OrderSide::Buy,
            price,
            quantity,
        }
    }

    #[test]
    fn test_limit_without_price_is_rejected() {
        let err = Order::try_from(place(OrderType::Limit, None, 1)).unwrap_err();
        assert_eq!(err, OrderError::MissingLimitPrice);
    }

    #[test]
    fn test_market_with_price_is_rejected() {
        let err = Order::try_from(place(OrderType::Market, Some(Decimal::ONE), 1)).unwrap_err();
        assert_eq!(err, OrderError::UnexpectedMarketPrice);
    }

    #[test]
    fn test_zero_quantity_is_rejected() {
        let err = Order::try_from(place(OrderType::Market, None, 0)).unwrap_err();
        assert_eq!(err, OrderError::NonPositiveQuantity);
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let price = Decimal::new(-1, 0);
        let err = Order::try_from(place(OrderType::Limit, Some(price), 1)).unwrap_err();
        assert_eq!(err, OrderError::NonPositivePrice(price));
    }

    #[test]
    fn test_valid_limit_order() {
        let order = Order::try_from(place(OrderType::Limit, Some(Decimal::new(10050, 2)), 5)).unwrap();
        assert_eq!(order.limit_price(), Some(Decimal::new(10050, 2)));
        assert_eq!(order.quantity(), 5);
    }
}
