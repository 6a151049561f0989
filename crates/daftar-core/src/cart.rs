//! # Cart Module
//!
//! Line pricing and cart arithmetic.
//!
//! ## Pricing Formulas
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  FIXED                                                                  │
//! │    final_unit_price = unit_price + Σ service.unit_price                 │
//! │                                                                         │
//! │  AREA  (area = width × height)                                          │
//! │    final_unit_price = unit_price × area + Σ service.unit_price × area   │
//! │                                                                         │
//! │  line total = final_unit_price × quantity                               │
//! │  cart total = Σ line totals                                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every mutation of dimensions or services goes through [`Cart`] methods,
//! which call [`recompute_final_unit_price`] so the derived price is never
//! left stale.

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{Dimensions, LineItem, PricingMethod, Product, SelectedService};
use crate::validation::{validate_dimensions, validate_line_item};
use crate::{MAX_CART_ITEMS, MAX_ITEM_QUANTITY};

// =============================================================================
// Pure Functions
// =============================================================================

/// `final_unit_price × quantity`.
#[inline]
pub fn line_item_total(item: &LineItem) -> Money {
    item.final_unit_price.multiply_quantity(item.quantity)
}

/// Sum of [`line_item_total`] over all items.
pub fn cart_total(items: &[LineItem]) -> Money {
    items.iter().map(line_item_total).sum()
}

/// Re-derives `final_unit_price` from price, pricing method, dimensions and services.
///
/// ## Example
/// ```rust
/// use daftar_core::cart::recompute_final_unit_price;
/// use daftar_core::{Dimensions, LineItem, Money, PricingMethod, SelectedService};
///
/// let mut banner = LineItem {
///     product_ref: "vinyl".into(),
///     name: "Vinyl banner".into(),
///     unit_price: Money::from_cents(1000),      // 10.00 per m²
///     quantity: 1,
///     pricing_method: PricingMethod::Area,
///     dimensions: Some(Dimensions::new(2.0, 1.5)),
///     wasted_dimensions: None,
///     selected_services: vec![SelectedService {
///         name: "Lamination".into(),
///         unit_price: Money::from_cents(200),   // 2.00 per m²
///     }],
///     final_unit_price: Money::zero(),
///     notes: None,
/// };
/// recompute_final_unit_price(&mut banner);
/// assert_eq!(banner.final_unit_price.cents(), 3600); // (10 + 2) × 3m²
/// ```
pub fn recompute_final_unit_price(item: &mut LineItem) {
    let services: Money = item.selected_services.iter().map(|s| s.unit_price).sum();

    item.final_unit_price = match item.pricing_method {
        PricingMethod::Fixed => item.unit_price + services,
        PricingMethod::Area => {
            let area = item.dimensions.map(|d| d.area()).unwrap_or(0.0);
            (item.unit_price + services).scale_by_area(area)
        }
    }
    .floor_zero();
}

impl LineItem {
    /// Builds a line from a catalog product with its price frozen.
    pub fn from_product(
        product: &Product,
        quantity: i64,
        dimensions: Option<Dimensions>,
        services: Vec<SelectedService>,
    ) -> Self {
        let mut item = LineItem {
            product_ref: product.id.clone(),
            name: product.name.clone(),
            unit_price: product.price,
            quantity,
            pricing_method: product.pricing_method,
            dimensions,
            wasted_dimensions: None,
            selected_services: services,
            final_unit_price: Money::zero(),
            notes: None,
        };
        recompute_final_unit_price(&mut item);
        item
    }

    /// Returns the line total.
    #[inline]
    pub fn total(&self) -> Money {
        line_item_total(self)
    }

    /// Two fixed-price lines of the same product and services can be merged.
    fn merges_with(&self, other: &LineItem) -> bool {
        self.pricing_method == PricingMethod::Fixed
            && other.pricing_method == PricingMethod::Fixed
            && self.product_ref == other.product_ref
            && self.unit_price == other.unit_price
            && self.selected_services == other.selected_services
            && self.notes == other.notes
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The ephemeral, ordered cart of the active POS session.
///
/// ## Invariants
/// - Every line has `quantity > 0` (setting 0 removes the line)
/// - Fixed-price lines of the same product and services are merged
/// - Area-priced lines are never merged (each has its own dimensions)
/// - At most `MAX_CART_ITEMS` lines, `MAX_ITEM_QUANTITY` per line
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cart {
    items: Vec<LineItem>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { items: Vec::new() }
    }

    /// Returns the lines in insertion order.
    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    /// Adds a line, merging quantities with an identical fixed-price line.
    pub fn add_item(&mut self, mut item: LineItem) -> CoreResult<()> {
        validate_line_item(&item)?;
        recompute_final_unit_price(&mut item);

        if let Some(existing) = self.items.iter_mut().find(|i| i.merges_with(&item)) {
            let new_qty = existing.quantity + item.quantity;
            if new_qty > MAX_ITEM_QUANTITY {
                return Err(CoreError::QuantityTooLarge {
                    requested: new_qty,
                    max: MAX_ITEM_QUANTITY,
                });
            }
            existing.quantity = new_qty;
            return Ok(());
        }

        if self.items.len() >= MAX_CART_ITEMS {
            return Err(CoreError::CartTooLarge { max: MAX_CART_ITEMS });
        }
        self.items.push(item);
        Ok(())
    }

    /// Sets the quantity of a line. Zero removes it.
    pub fn update_quantity(&mut self, index: usize, quantity: i64) -> CoreResult<()> {
        if quantity == 0 {
            return self.remove_item(index).map(|_| ());
        }
        if quantity < 0 {
            return Err(crate::error::ValidationError::MustBePositive {
                field: "quantity".to_string(),
            }
            .into());
        }
        if quantity > MAX_ITEM_QUANTITY {
            return Err(CoreError::QuantityTooLarge {
                requested: quantity,
                max: MAX_ITEM_QUANTITY,
            });
        }
        let item = self.line_mut(index)?;
        item.quantity = quantity;
        Ok(())
    }

    /// Changes the printed size of a line and re-prices it.
    pub fn update_dimensions(
        &mut self,
        index: usize,
        dimensions: Option<Dimensions>,
        wasted: Option<Dimensions>,
    ) -> CoreResult<()> {
        if let Some(d) = &dimensions {
            validate_dimensions(d)?;
        }
        let item = self.line_mut(index)?;
        item.dimensions = dimensions;
        item.wasted_dimensions = wasted;
        recompute_final_unit_price(item);
        Ok(())
    }

    /// Replaces the selected services of a line and re-prices it.
    pub fn set_services(&mut self, index: usize, services: Vec<SelectedService>) -> CoreResult<()> {
        let item = self.line_mut(index)?;
        item.selected_services = services;
        recompute_final_unit_price(item);
        Ok(())
    }

    /// Removes a line and returns it.
    pub fn remove_item(&mut self, index: usize) -> CoreResult<LineItem> {
        if index >= self.items.len() {
            return Err(CoreError::ItemNotInCart(index));
        }
        Ok(self.items.remove(index))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn total(&self) -> Money {
        cart_total(&self.items)
    }

    fn line_mut(&mut self, index: usize) -> CoreResult<&mut LineItem> {
        self.items
            .get_mut(index)
            .ok_or(CoreError::ItemNotInCart(index))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, cents: i64, method: PricingMethod) -> Product {
        Product {
            id: id.to_string(),
            name: format!("Product {}", id),
            price: Money::from_cents(cents),
            pricing_method: method,
        }
    }

    fn service(name: &str, cents: i64) -> SelectedService {
        SelectedService {
            name: name.to_string(),
            unit_price: Money::from_cents(cents),
        }
    }

    #[test]
    fn test_fixed_price_adds_services() {
        let item = LineItem::from_product(
            &product("cards", 500, PricingMethod::Fixed),
            3,
            None,
            vec![service("Rounded corners", 50), service("Gloss", 25)],
        );
        assert_eq!(item.final_unit_price.cents(), 575);
        assert_eq!(line_item_total(&item).cents(), 1725);
    }

    #[test]
    fn test_area_price_without_dimensions_is_zero() {
        let item = LineItem::from_product(&product("vinyl", 1000, PricingMethod::Area), 1, None, vec![]);
        assert_eq!(item.final_unit_price, Money::zero());
    }

    #[test]
    fn test_cart_total_sums_lines() {
        let mut cart = Cart::new();
        cart.add_item(LineItem::from_product(&product("a", 1000, PricingMethod::Fixed), 2, None, vec![]))
            .unwrap();
        cart.add_item(LineItem::from_product(
            &product("b", 1000, PricingMethod::Area),
            1,
            Some(Dimensions::new(1.0, 0.5)),
            vec![],
        ))
        .unwrap();
        assert_eq!(cart.total().cents(), 2500);
    }

    #[test]
    fn test_fixed_lines_merge_area_lines_do_not() {
        let mut cart = Cart::new();
        let cards = product("cards", 500, PricingMethod::Fixed);
        let vinyl = product("vinyl", 1000, PricingMethod::Area);

        cart.add_item(LineItem::from_product(&cards, 1, None, vec![])).unwrap();
        cart.add_item(LineItem::from_product(&cards, 2, None, vec![])).unwrap();
        cart.add_item(LineItem::from_product(&vinyl, 1, Some(Dimensions::new(1.0, 1.0)), vec![]))
            .unwrap();
        cart.add_item(LineItem::from_product(&vinyl, 1, Some(Dimensions::new(1.0, 1.0)), vec![]))
            .unwrap();

        assert_eq!(cart.len(), 3);
        assert_eq!(cart.items()[0].quantity, 3);
    }

    #[test]
    fn test_update_dimensions_reprices() {
        let mut cart = Cart::new();
        cart.add_item(LineItem::from_product(
            &product("vinyl", 1000, PricingMethod::Area),
            1,
            Some(Dimensions::new(1.0, 1.0)),
            vec![],
        ))
        .unwrap();

        cart.update_dimensions(0, Some(Dimensions::new(2.0, 2.0)), Some(Dimensions::new(0.1, 2.0)))
            .unwrap();
        assert_eq!(cart.items()[0].final_unit_price.cents(), 4000);

        cart.set_services(0, vec![service("Eyelets", 100)]).unwrap();
        assert_eq!(cart.items()[0].final_unit_price.cents(), 4400);
    }

    #[test]
    fn test_update_quantity_zero_removes() {
        let mut cart = Cart::new();
        cart.add_item(LineItem::from_product(&product("a", 100, PricingMethod::Fixed), 1, None, vec![]))
            .unwrap();
        cart.update_quantity(0, 0).unwrap();
        assert!(cart.is_empty());
        assert!(matches!(cart.update_quantity(0, 2), Err(CoreError::ItemNotInCart(0))));
    }

    #[test]
    fn test_quantity_limit() {
        let mut cart = Cart::new();
        let p = product("a", 100, PricingMethod::Fixed);
        cart.add_item(LineItem::from_product(&p, MAX_ITEM_QUANTITY, None, vec![]))
            .unwrap();
        assert!(matches!(
            cart.add_item(LineItem::from_product(&p, 1, None, vec![])),
            Err(CoreError::QuantityTooLarge { .. })
        ));
    }
}
