// Rust guideline compliant 2026-10-12

//! Order document → SMS text.
//!
//! [`OrderDisplay::project`] turns the loosely-typed document into a
//! fully-populated display record (one fallback rule per field);
//! [`render`] lays that record out as the message body. Both are pure.

use domain::Document;
use serde_json::Value;

/// Shown when neither `cart` nor `cartItems` holds an item.
pub const NO_ITEMS: &str = "No items";

const UNNAMED_ITEM: &str = "Unnamed Item";
const UNNAMED_EXTRA: &str = "Unnamed Extra";
const NOT_AVAILABLE: &str = "N/A";
const NO_NOTE: &str = "None";
const NO_VALUE: &str = "-";
const UNKNOWN_CUSTOMER: &str = "Unknown";
const ZERO_AMOUNT: &str = "0.00";

// ---------------------------------------------------------------------------
// Display record
// ---------------------------------------------------------------------------

/// One extra attached to a cart item.
#[derive(Debug, Clone, PartialEq)]
pub struct ExtraLine {
    /// Extra name. Absent names render as `"Unnamed Extra"`, the same rule
    /// items follow, rather than a bare missing-value marker.
    pub name: String,
    /// Quantity; absent or zero reads as 1.
    pub quantity: f64,
    /// Unit price; numeric strings accepted, otherwise 0.
    pub price: f64,
}

/// One cart line.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemLine {
    /// Item name, `"Unnamed Item"` when absent or empty.
    pub name: String,
    /// Quantity; only an absent value defaults to 1.
    pub quantity: f64,
    /// Optional size label, rendered as ` (size)`.
    pub size: Option<String>,
    /// Unit price; anything but a JSON number reads as 0.
    pub unit_price: f64,
    /// Extras, possibly empty.
    pub extras: Vec<ExtraLine>,
}

impl ItemLine {
    /// `unit_price * quantity`.
    #[must_use]
    pub fn line_total(&self) -> f64 {
        self.unit_price * self.quantity
    }

    fn render(&self, currency: &str) -> String {
        let size = self.size.as_deref().map(|s| format!(" ({s})")).unwrap_or_default();
        let mut line = format!(
            "{}x {}{size} - {currency}{}",
            self.quantity,
            self.name,
            money(self.line_total())
        );
        if !self.extras.is_empty() {
            line.push_str("\nExtras:");
            for extra in &self.extras {
                line.push_str(&format!(
                    "\n - {} ({currency}{}) {}x",
                    extra.name,
                    money(extra.price),
                    extra.quantity
                ));
            }
        }
        line
    }
}

/// Every value the message shows, fallbacks already applied.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDisplay {
    /// Document id.
    pub order_id: String,
    /// `restaurantName` or `"N/A"`.
    pub restaurant: String,
    /// Lines from `cart`, else `cartItems`, else empty.
    pub items: Vec<ItemLine>,
    /// `deliveryDetails.note` or `"None"`.
    pub note: String,
    /// `totalAmount` with two decimals, or `"0.00"`.
    pub total: String,
    /// `deliveryDetails.hostel` or `"N/A"`.
    pub hostel: String,
    /// `deliveryDetails.location` or `"-"`.
    pub room: String,
    /// `userName` or `"Unknown"`.
    pub customer: String,
    /// `deliveryDetails.contactNumber` or `"-"`.
    pub contact: String,
}

impl OrderDisplay {
    /// Project a raw order document. Never fails: every missing or mistyped
    /// field falls back to its placeholder.
    #[must_use]
    pub fn project(document: &Document) -> Self {
        let delivery = document.get("deliveryDetails").unwrap_or(&Value::Null);
        let cart = document
            .get("cart")
            .and_then(Value::as_array)
            .or_else(|| document.get("cartItems").and_then(Value::as_array));

        Self {
            order_id: document.id.clone(),
            restaurant: text_or(document.get("restaurantName"), NOT_AVAILABLE),
            items: cart.map(|items| items.iter().map(project_item).collect()).unwrap_or_default(),
            note: text_or(delivery.get("note"), NO_NOTE),
            total: lenient_number(document.get("totalAmount"))
                .map_or_else(|| ZERO_AMOUNT.to_owned(), money),
            hostel: text_or(delivery.get("hostel"), NOT_AVAILABLE),
            room: text_or(delivery.get("location"), NO_VALUE),
            customer: text_or(document.get("userName"), UNKNOWN_CUSTOMER),
            contact: text_or(delivery.get("contactNumber"), NO_VALUE),
        }
    }
}

/// Two-decimal amount. Exact half-cent ties round away from zero
/// (`10.625` → `10.63`); everything else rounds to nearest.
#[must_use]
pub fn money(amount: f64) -> String {
    // Only odd multiples of 1/8 sit exactly between two cents, and `{:.2}`
    // would send those to the even neighbour. Scaling by 8 and 100 is exact
    // for them.
    let eighths = amount * 8.0;
    #[allow(clippy::float_cmp, reason = "exact tie detection on exactly scaled values")]
    let tie = eighths.fract() == 0.0 && (eighths % 2.0).abs() == 1.0;
    if tie {
        format!("{:.2}", (amount * 100.0).round() / 100.0)
    } else {
        format!("{amount:.2}")
    }
}

fn project_item(item: &Value) -> ItemLine {
    let extras = item
        .get("extras")
        .and_then(Value::as_array)
        .map(|extras| extras.iter().map(project_extra).collect())
        .unwrap_or_default();
    ItemLine {
        name: text_or(item.get("name"), UNNAMED_ITEM),
        quantity: lenient_number(item.get("quantity")).unwrap_or(1.0),
        size: text(item.get("size")),
        unit_price: item.get("price").and_then(Value::as_f64).unwrap_or(0.0),
        extras,
    }
}

fn project_extra(extra: &Value) -> ExtraLine {
    ExtraLine {
        name: text_or(extra.get("name"), UNNAMED_EXTRA),
        quantity: lenient_number(extra.get("quantity"))
            .filter(|q| q.abs() > f64::EPSILON)
            .unwrap_or(1.0),
        price: lenient_number(extra.get("price")).unwrap_or(0.0),
    }
}

/// Non-empty string, or a number shown as written. Anything else is absent.
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn text_or(value: Option<&Value>, fallback: &str) -> String {
    text(value).unwrap_or_else(|| fallback.to_owned())
}

/// JSON number, or a string that parses as a finite number.
fn lenient_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Lay out the SMS body. `currency` prefixes every amount (e.g. `"GHC"`).
#[must_use]
pub fn render(display: &OrderDisplay, currency: &str) -> String {
    let items = if display.items.is_empty() {
        NO_ITEMS.to_owned()
    } else {
        display
            .items
            .iter()
            .map(|item| item.render(currency))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "New Order Received!\n\
         \n\
         Restaurant: {restaurant}\n\
         Items:\n\
         {items}\n\
         Note: {note}\n\
         Total: {currency}{total}\n\
         \n\
         Location: {hostel}, Room {room}\n\
         Customer: {customer}\n\
         Contact: {contact}\n\
         \n\
         Order ID: {order_id}",
        restaurant = display.restaurant,
        note = display.note,
        total = display.total,
        hostel = display.hostel,
        room = display.room,
        customer = display.customer,
        contact = display.contact,
        order_id = display.order_id,
    )
}

#[cfg(test)]
mod tests {
    use super::{NO_ITEMS, OrderDisplay, money, render};
    use domain::Document;
    use serde_json::json;

    fn burger_order() -> Document {
        Document::from_value(
            "order-42",
            json!({
                "restaurantName": "Test Spot",
                "userName": "Kofi",
                "totalAmount": 20.0,
                "cart": [{ "name": "Burger", "quantity": 2, "price": 10 }],
                "deliveryDetails": {
                    "hostel": "North",
                    "location": "12",
                    "contactNumber": "0551234567",
                    "note": ""
                }
            }),
        )
    }

    #[test]
    fn renders_full_message() {
        let message = render(&OrderDisplay::project(&burger_order()), "GHC");
        let expected = "New Order Received!\n\
                        \n\
                        Restaurant: Test Spot\n\
                        Items:\n\
                        2x Burger - GHC20.00\n\
                        Note: None\n\
                        Total: GHC20.00\n\
                        \n\
                        Location: North, Room 12\n\
                        Customer: Kofi\n\
                        Contact: 0551234567\n\
                        \n\
                        Order ID: order-42";
        assert_eq!(message, expected);
    }

    #[test]
    fn currency_prefix_is_configurable() {
        let message = render(&OrderDisplay::project(&burger_order()), "GH₵");
        assert!(message.contains("2x Burger - GH₵20.00"), "{message}");
        assert!(message.contains("Total: GH₵20.00"), "{message}");
    }

    #[test]
    fn empty_document_uses_every_fallback() {
        let display = OrderDisplay::project(&Document::from_value("o-7", json!({})));
        assert_eq!(display.restaurant, "N/A");
        assert!(display.items.is_empty());
        assert_eq!(display.note, "None");
        assert_eq!(display.total, "0.00");
        assert_eq!(display.hostel, "N/A");
        assert_eq!(display.room, "-");
        assert_eq!(display.customer, "Unknown");
        assert_eq!(display.contact, "-");

        let message = render(&display, "GHC");
        assert!(message.contains(&format!("Items:\n{NO_ITEMS}\n")), "{message}");
        assert!(message.contains("Total: GHC0.00"));
        assert!(message.ends_with("Order ID: o-7"));
    }

    #[test]
    fn cart_items_used_when_cart_missing() {
        let doc = Document::from_value(
            "o-1",
            json!({ "cartItems": [{ "name": "Jollof", "price": 35.5 }] }),
        );
        let message = render(&OrderDisplay::project(&doc), "GHC");
        assert!(message.contains("1x Jollof - GHC35.50"), "{message}");
    }

    #[test]
    fn non_array_cart_falls_through_to_cart_items() {
        let doc = Document::from_value(
            "o-1",
            json!({ "cart": "oops", "cartItems": [{ "name": "Waakye" }] }),
        );
        let display = OrderDisplay::project(&doc);
        assert_eq!(display.items.len(), 1);
        assert_eq!(display.items[0].name, "Waakye");
    }

    #[test]
    fn item_fallbacks_size_and_extras() {
        let doc = Document::from_value(
            "o-2",
            json!({
                "cart": [{
                    "quantity": 3,
                    "size": "Large",
                    "price": "12",
                    "extras": [
                        { "name": "Egg", "price": "2.5", "quantity": 2 },
                        { "price": 1 }
                    ]
                }]
            }),
        );
        let message = render(&OrderDisplay::project(&doc), "GHC");
        assert!(
            message.contains(
                "3x Unnamed Item (Large) - GHC0.00\n\
                 Extras:\n \
                 - Egg (GHC2.50) 2x\n \
                 - Unnamed Extra (GHC1.00) 1x"
            ),
            "{message}"
        );
    }

    #[test]
    fn explicit_zero_quantity_is_kept_for_items() {
        let doc = Document::from_value(
            "o-3",
            json!({ "cart": [{ "name": "Kenkey", "quantity": 0, "price": 8 }] }),
        );
        let display = OrderDisplay::project(&doc);
        assert!(display.items[0].quantity.abs() < f64::EPSILON);
        assert!(render(&display, "GHC").contains("0x Kenkey - GHC0.00"));
    }

    #[test]
    fn numeric_contact_and_string_total_are_displayed() {
        let doc = Document::from_value(
            "o-4",
            json!({
                "totalAmount": "45.5",
                "deliveryDetails": { "contactNumber": 551_234_567 }
            }),
        );
        let display = OrderDisplay::project(&doc);
        assert_eq!(display.total, "45.50");
        assert_eq!(display.contact, "551234567");
    }

    #[test]
    fn line_total_multiplies_price_by_quantity() {
        let doc = Document::from_value(
            "o-5",
            json!({ "cart": [{ "name": "Fries", "quantity": 1.5, "price": 4 }] }),
        );
        let display = OrderDisplay::project(&doc);
        assert!((display.items[0].line_total() - 6.0).abs() < f64::EPSILON);
        assert!(render(&display, "GHC").contains("1.5x Fries - GHC6.00"));
    }

    #[test]
    fn half_cent_ties_round_up() {
        assert_eq!(money(10.625), "10.63");
        assert_eq!(money(1.125), "1.13");
        assert_eq!(money(0.375), "0.38");
        assert_eq!(money(-2.125), "-2.13");
    }

    #[test]
    fn non_ties_round_to_nearest() {
        // 1.005 is stored just below the tie, so it rounds down.
        assert_eq!(money(1.005), "1.00");
        assert_eq!(money(2.675), "2.67");
        assert_eq!(money(20.0), "20.00");
        assert_eq!(money(0.25), "0.25");
        assert_eq!(money(3.999), "4.00");
    }

    #[test]
    fn tie_amounts_in_message_round_up() {
        let doc = Document::from_value(
            "o-6",
            json!({
                "totalAmount": 10.625,
                "cart": [{
                    "name": "Kelewele",
                    "quantity": 0.5,
                    "price": 2.25,
                    "extras": [{ "name": "Pepper", "price": 0.125 }]
                }]
            }),
        );

        let message = render(&OrderDisplay::project(&doc), "GHC");

        assert!(message.contains("0.5x Kelewele - GHC1.13"), "{message}");
        assert!(message.contains(" - Pepper (GHC0.13) 1x"), "{message}");
        assert!(message.contains("Total: GHC10.63"), "{message}");
    }
}
