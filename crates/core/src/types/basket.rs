//! Shopping basket types.
//!
//! Only the fields the identity workflow reads are modelled; unknown fields
//! from the platform are ignored on deserialization.

use serde::{Deserialize, Serialize};

use super::id::{BasketId, CustomerId, ProductId};

/// A line item in a basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductItem {
    /// Line item ID.
    pub item_id: String,
    /// Product (variation) ID.
    pub product_id: ProductId,
    /// Quantity ordered.
    #[serde(default)]
    pub quantity: u32,
}

/// Customer details attached to a basket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerInfo {
    /// Owning customer.
    pub customer_id: CustomerId,
}

/// A shopping basket belonging to a guest or registered customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Basket {
    /// Basket ID.
    pub basket_id: BasketId,
    /// Owning customer details.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_info: Option<CustomerInfo>,
    /// Line items. The platform omits the field for empty baskets.
    #[serde(default)]
    pub product_items: Vec<ProductItem>,
}

impl Basket {
    /// The customer the basket belongs to, when the platform reports one.
    #[must_use]
    pub fn customer_id(&self) -> Option<&CustomerId> {
        self.customer_info.as_ref().map(|info| &info.customer_id)
    }

    /// Number of line items in the basket.
    #[must_use]
    pub fn item_count(&self) -> usize {
        self.product_items.len()
    }

    /// Whether the basket has no line items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.product_items.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_platform_basket() {
        let json = r#"{
            "basketId": "bsk-1",
            "customerInfo": {"customerId": "cust-1"},
            "currency": "USD",
            "productItems": [
                {"itemId": "line-1", "productId": "sku-1", "quantity": 2, "price": 19.99},
                {"itemId": "line-2", "productId": "sku-2", "quantity": 1}
            ]
        }"#;

        let basket: Basket = serde_json::from_str(json).unwrap();
        assert_eq!(basket.basket_id.as_str(), "bsk-1");
        assert_eq!(basket.item_count(), 2);
        assert_eq!(basket.customer_id().map(CustomerId::as_str), Some("cust-1"));
        assert_eq!(basket.product_items[0].quantity, 2);
    }

    #[test]
    fn test_missing_product_items_is_empty() {
        let basket: Basket = serde_json::from_str(r#"{"basketId": "bsk-2"}"#).unwrap();
        assert!(basket.is_empty());
        assert_eq!(basket.item_count(), 0);
    }
}
