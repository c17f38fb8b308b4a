//! Shopper baskets and customers client.

use std::sync::Arc;

use larkspur_core::{Basket, CustomerId};
use tracing::instrument;

use super::{CommerceError, CustomerBaskets, api_error};
use crate::config::CommerceConfig;

/// Client for the basket endpoints used around login.
#[derive(Clone)]
pub struct ShopperBasketsClient {
    inner: Arc<ShopperBasketsClientInner>,
}

struct ShopperBasketsClientInner {
    client: reqwest::Client,
    customers_base: String,
    baskets_base: String,
    site_id: String,
}

impl ShopperBasketsClient {
    /// Create a client for the configured organization and site.
    #[must_use]
    pub fn new(client: reqwest::Client, config: &CommerceConfig) -> Self {
        let api = config.api_base_url.trim_end_matches('/');
        let org = config.organization_id();

        Self {
            inner: Arc::new(ShopperBasketsClientInner {
                client,
                customers_base: format!("{api}/customer/shopper-customers/v1/organizations/{org}"),
                baskets_base: format!("{api}/checkout/shopper-baskets/v1/organizations/{org}"),
                site_id: config.site_id.clone(),
            }),
        }
    }

    /// Baskets owned by a customer (guest or registered).
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup fails.
    #[instrument(skip(self, access_token), fields(customer_id = %customer_id))]
    pub async fn customer_baskets(
        &self,
        customer_id: &CustomerId,
        access_token: &str,
    ) -> Result<CustomerBaskets, CommerceError> {
        let url = format!(
            "{}/customers/{}/baskets?siteId={}",
            self.inner.customers_base,
            urlencoding::encode(customer_id.as_str()),
            urlencoding::encode(&self.inner.site_id)
        );

        let response = self
            .inner
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }

    /// Merge the previous guest basket into the registered shopper's basket.
    ///
    /// The guest basket is identified by the platform from the registered
    /// token's shopper session. The destination basket is created when
    /// `create_destination_basket` is set and the shopper has none.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform rejects the merge.
    #[instrument(skip_all)]
    pub async fn merge_basket(
        &self,
        access_token: &str,
        create_destination_basket: bool,
    ) -> Result<Basket, CommerceError> {
        let url = format!(
            "{}/baskets/actions/merge?createDestinationBasket={create_destination_basket}&siteId={}",
            self.inner.baskets_base,
            urlencoding::encode(&self.inner.site_id)
        );

        let response = self
            .inner
            .client
            .post(&url)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(api_error(response).await);
        }

        Ok(response.json().await?)
    }
}
