//! Purpose: Product browsing endpoints and their payloads.
//! Exports: `CatalogApi`, `RelatedFilter`, product/category DTOs.
//! Role: Read-only listing, search, detail, and related-product resources.
//! Invariants: Optional query parameters are omitted, never sent empty.

use super::envelope::Envelope;
use crate::core::pipeline::{Pipeline, Resource};
use crate::core::transport::ApiRequest;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DiscountType {
    Fixed,
    Unit,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
}

/// Product as it appears in listings, search results and populated carts.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    pub id: String,
    pub category_id: String,
    pub product_name: String,
    pub product_description: String,
    pub product_price: String,
    pub product_discount: String,
    pub product_discount_type: DiscountType,
    pub product_quantity: u32,
    pub slug: String,
    pub image_url: String,
    pub location: String,
    pub max_age_range: u32,
    pub created_at: String,
    pub updated_at: String,
    pub selling_price: String,
    pub avg_rating: f64,
    #[serde(default)]
    pub is_rated: bool,
    #[serde(default)]
    pub rating_given: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct HomeListing {
    pub new_added: Vec<ProductSummary>,
    pub trending: Vec<ProductSummary>,
    pub similar_to_recent_view: Vec<ProductSummary>,
    pub explore: Vec<ProductSummary>,
    pub same_location: Vec<ProductSummary>,
    pub age_range: Vec<ProductSummary>,
    pub might_interest_you: Vec<ProductSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Categories {
    pub categories: Vec<CategoryData>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CategoryProducts {
    pub id: String,
    pub name: String,
    pub created_at: String,
    pub updated_at: String,
    pub products: Vec<ProductSummary>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PublicUser {
    pub id: String,
    pub username: String,
    pub location: String,
    pub age: i32,
    pub gender: String,
    pub created_at: String,
    pub updated_at: String,
}

/// A rating; `user_id` is an id string or a populated `PublicUser`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rating<U> {
    pub id: String,
    pub user_id: U,
    pub product_id: String,
    pub rating: u8,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductDetails {
    pub id: String,
    pub category_id: CategoryData,
    pub product_name: String,
    pub product_description: String,
    pub product_price: String,
    pub product_discount: String,
    pub product_discount_type: DiscountType,
    pub product_quantity: u32,
    pub slug: String,
    pub image_url: String,
    pub location: String,
    pub max_age_range: u32,
    pub created_at: String,
    pub updated_at: String,
    pub selling_price: String,
    pub avg_rating: f64,
    #[serde(default)]
    pub product_ratings: Vec<Rating<PublicUser>>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RelatedFilter {
    pub location: Option<String>,
    pub max_price: Option<f64>,
    pub category_id: Option<String>,
}

#[derive(Clone)]
pub struct CatalogApi {
    pipeline: Pipeline,
}

impl CatalogApi {
    pub fn new(pipeline: Pipeline) -> Self {
        Self { pipeline }
    }

    /// `recent_view` is the comma-joined recently viewed ids (may be empty).
    pub fn home_listing(&self, recent_view: &str) -> Resource<Envelope<HomeListing>> {
        self.pipeline.resource(
            ApiRequest::get(&["product", "home-product-listing"])
                .with_query("recent_view", recent_view),
        )
    }

    pub fn categories(&self) -> Resource<Envelope<Categories>> {
        self.pipeline
            .resource(ApiRequest::get(&["product", "all-categories"]))
    }

    pub fn product(&self, product_id: &str) -> Resource<Envelope<ProductDetails>> {
        self.pipeline
            .resource(ApiRequest::get(&["product", product_id]))
    }

    pub fn search(&self, name: &str) -> Resource<Envelope<Vec<ProductSummary>>> {
        self.pipeline
            .resource(ApiRequest::get(&["product", "search", ""]).with_query("name", name))
    }

    pub fn by_category(&self, category_id: &str) -> Resource<Envelope<CategoryProducts>> {
        self.pipeline.resource(ApiRequest::get(&[
            "product",
            "get-product-by-category",
            category_id,
        ]))
    }

    pub fn related(
        &self,
        product_id: &str,
        filter: &RelatedFilter,
    ) -> Resource<Envelope<Vec<ProductSummary>>> {
        let request = ApiRequest::get(&["product", "get-related-products", product_id])
            .with_optional_query("location", filter.location.clone())
            .with_optional_query("max_price", filter.max_price.map(|price| price.to_string()))
            .with_optional_query("category_id", filter.category_id.clone());
        self.pipeline.resource(request)
    }
}
