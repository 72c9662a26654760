//! crates/shelf_core/src/client_store.rs
//!
//! The browser-side state the viewers and the cart share: the viewer dark-mode
//! flag and the cart mirror. All writes go through this type, and every
//! mutation bumps `revision` so a UI can tell when to re-render.

use tracing::warn;

use crate::domain::CartItem;

/// Storage key of the viewer dark-mode flag.
pub const DARK_MODE_KEY: &str = "pdfViewerDarkMode";
/// Storage key of the cart mirror.
pub const CART_KEY: &str = "cart";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientStore {
    dark_mode: bool,
    cart: Vec<CartItem>,
    revision: u64,
}

impl ClientStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    pub fn set_dark_mode(&mut self, enabled: bool) {
        if self.dark_mode != enabled {
            self.dark_mode = enabled;
            self.bump();
        }
    }

    pub fn cart(&self) -> &[CartItem] {
        &self.cart
    }

    pub fn cart_total(&self) -> f64 {
        self.cart
            .iter()
            .map(|item| item.price * f64::from(item.quantity))
            .sum()
    }

    /// Adds `item`, merging quantities with an existing line for the same book.
    pub fn add_to_cart(&mut self, item: CartItem) {
        if item.quantity == 0 {
            return;
        }
        match self.cart.iter_mut().find(|line| line.book_id == item.book_id) {
            Some(line) => line.quantity = line.quantity.saturating_add(item.quantity),
            None => self.cart.push(item),
        }
        self.bump();
    }

    /// Sets the quantity of a line; zero removes it. Returns `false` if the book is not in the cart.
    pub fn set_quantity(&mut self, book_id: &str, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove_from_cart(book_id);
        }
        let Some(line) = self.cart.iter_mut().find(|line| line.book_id == book_id) else {
            return false;
        };
        line.quantity = quantity;
        self.bump();
        true
    }

    pub fn remove_from_cart(&mut self, book_id: &str) -> bool {
        let before = self.cart.len();
        self.cart.retain(|line| line.book_id != book_id);
        let removed = self.cart.len() != before;
        if removed {
            self.bump();
        }
        removed
    }

    pub fn clear_cart(&mut self) {
        if !self.cart.is_empty() {
            self.cart.clear();
            self.bump();
        }
    }

    /// Overwrites the mirror with the server's copy. Called after every server
    /// mutation; the server's answer always wins.
    pub fn replace_cart_from_server(&mut self, server_cart: Vec<CartItem>) {
        self.cart = server_cart;
        self.bump();
    }

    /// Merges the anonymous cart into the server's cart on login.
    ///
    /// Lines present on the server keep the server's quantity. Lines only known
    /// locally are kept and returned so the caller can upload them.
    pub fn merge_on_login(&mut self, server_cart: Vec<CartItem>) -> Vec<CartItem> {
        let local_only: Vec<CartItem> = self
            .cart
            .iter()
            .filter(|local| !server_cart.iter().any(|s| s.book_id == local.book_id))
            .cloned()
            .collect();
        let mut merged = server_cart;
        merged.extend(local_only.iter().cloned());
        self.cart = merged;
        self.bump();
        local_only
    }

    /// The key/value pairs to write to browser storage.
    pub fn to_storage(&self) -> Vec<(&'static str, String)> {
        let cart = serde_json::to_string(&self.cart).unwrap_or_else(|e| {
            warn!(error = %e, "Failed to serialize cart mirror.");
            "[]".to_string()
        });
        vec![
            (DARK_MODE_KEY, self.dark_mode.to_string()),
            (CART_KEY, cart),
        ]
    }

    /// Rebuilds the store from browser storage. Missing or corrupt entries fall back to defaults.
    pub fn from_storage(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let dark_mode = lookup(DARK_MODE_KEY).is_some_and(|v| v.trim() == "true");
        let cart = match lookup(CART_KEY) {
            Some(raw) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                warn!(error = %e, "Discarding corrupt cart mirror.");
                Vec::new()
            }),
            None => Vec::new(),
        };
        Self {
            dark_mode,
            cart,
            revision: 0,
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }
}
