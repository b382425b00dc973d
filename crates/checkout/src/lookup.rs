//! Catalog and buyer checks shared by the cart and checkout paths.

use domain::{Buyer, BuyerDirectory, BuyerId, Catalog, OptionId, Product, ProductId, ProductOption};

use crate::error::{CheckoutError, Result};

pub(crate) async fn require_buyer(buyers: &dyn BuyerDirectory, buyer_id: BuyerId) -> Result<Buyer> {
    buyers
        .find_buyer(buyer_id)
        .await?
        .ok_or(CheckoutError::BuyerNotFound(buyer_id))
}

/// Loads a product and, if given, one of its active options.
///
/// An option that belongs to another product or has been deactivated is
/// refused.
pub(crate) async fn resolve_product(
    catalog: &dyn Catalog,
    product_id: &ProductId,
    option_id: Option<&OptionId>,
) -> Result<(Product, Option<ProductOption>)> {
    let product = catalog
        .find_product(product_id)
        .await?
        .ok_or_else(|| CheckoutError::ProductNotFound(product_id.clone()))?;

    let option = match option_id {
        None => None,
        Some(option_id) => {
            let option = catalog
                .find_option(option_id)
                .await?
                .filter(|o| &o.product_id == product_id && o.active)
                .ok_or_else(|| CheckoutError::OptionUnavailable {
                    product_id: product_id.clone(),
                    option_id: option_id.clone(),
                })?;
            Some(option)
        }
    };

    Ok((product, option))
}
