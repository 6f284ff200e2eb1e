//! Purpose: Cart, checkout, order history, and rating endpoints.
//! Exports: `CartApi`, `CartAction`, `AddToCartRequest`, `RateProductRequest`, cart/order DTOs.
//! Role: Authenticated commerce operations; all require a bearer token server-side.
//! Invariants: Carts and orders are generic over the item shape (ids or populated products).
#![allow(clippy::result_large_err)]

use super::catalog::{ProductSummary, Rating};
use super::envelope::Envelope;
use super::validation::{validate_email, validate_rating};
use crate::core::error::{Error, ErrorKind};
use crate::core::pipeline::{Pipeline, Resource};
use crate::core::transport::ApiRequest;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CartAction {
    Add,
    Remove,
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct AddToCartRequest {
    pub product_id: String,
    pub quantity: u32,
    pub action: CartAction,
}

impl AddToCartRequest {
    pub fn new(product_id: &str, quantity: u32, action: CartAction) -> Result<Self, Error> {
        if product_id.trim().is_empty() {
            return Err(Error::new(ErrorKind::Usage).with_message("Product id cannot be empty"));
        }
        if quantity == 0 {
            return Err(Error::new(ErrorKind::Usage).with_message("Quantity must be at least 1"));
        }
        Ok(Self {
            product_id: product_id.trim().to_string(),
            quantity,
            action,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
pub struct RateProductRequest {
    pub product_id: String,
    pub rating: u8,
}

impl RateProductRequest {
    pub fn new(product_id: &str, rating: u8) -> Result<Self, Error> {
        Ok(Self {
            product_id: product_id.trim().to_string(),
            rating: validate_rating(rating)?,
        })
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PopulatedCartItem {
    pub product_id: ProductSummary,
    pub quantity: u32,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CartData<I> {
    pub id: String,
    pub user_id: String,
    pub cart_items: Vec<I>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderData<I> {
    pub id: String,
    pub order_no: String,
    pub order_total: String,
    pub order_status: String,
    pub order_item: Vec<I>,
    pub created_at: String,
    pub updated_at: String,
}

pub type Cart = CartData<CartItem>;
pub type PopulatedCart = CartData<PopulatedCartItem>;
pub type Order = OrderData<CartItem>;
pub type PopulatedOrder = OrderData<PopulatedCartItem>;

#[derive(Clone)]
pub struct CartApi {
    pipeline: Pipeline,
}

impl CartApi {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    pub fn add_to_cart(&self, request: &AddToCartRequest) -> Resource<Envelope<Cart>> {
        self.pipeline
            .try_resource(ApiRequest::patch(&["cart", "add-to-cart"]).with_json(request))
    }

    pub fn cart(&self) -> Resource<Envelope<PopulatedCart>> {
        self.pipeline
            .resource(ApiRequest::get(&["cart", "get-user-cart"]).with_query("populate", "yes"))
    }

    pub fn remove_from_cart(&self, product_id: &str) -> Resource<Envelope<Cart>> {
        self.pipeline
            .resource(ApiRequest::delete(&["cart", "remove-from-cart", product_id]))
    }

    pub fn empty_cart(&self) -> Resource<Envelope<Cart>> {
        self.pipeline
            .resource(ApiRequest::delete(&["cart", "empty-cart"]))
    }

    /// Validates the receipt address before building the request.
    pub fn checkout(&self, receipt_email: &str) -> Result<Resource<Envelope<Order>>, Error> {
        let email = validate_email(receipt_email)?;
        Ok(self.pipeline.resource(
            ApiRequest::post(&["order", "checkout"]).with_query("receipt_email", email),
        ))
    }

    pub fn orders(&self) -> Resource<Envelope<Vec<PopulatedOrder>>> {
        self.pipeline
            .resource(ApiRequest::get(&["order", "get-all-users-orders"]))
    }

    pub fn rate_product(&self, request: &RateProductRequest) -> Resource<Envelope<Rating<String>>> {
        self.pipeline.try_resource(
            ApiRequest::post(&["product", "add-product-rating"]).with_json(request),
        )
    }
}
