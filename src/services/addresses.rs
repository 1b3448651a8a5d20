//! Address book consumption.
//!
//! The account address book lives server-side; this service caches it for
//! the session, computes the default selection once at checkout start, and
//! applies default-flag changes optimistically with rollback on failure.

use std::sync::{Arc, RwLock};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{api::CommerceApi, errors::CheckoutError, models::Address};

pub struct AddressService {
    api: Arc<dyn CommerceApi>,
    book: RwLock<Option<Vec<Address>>>,
}

impl AddressService {
    pub fn new(api: Arc<dyn CommerceApi>) -> Self {
        Self {
            api,
            book: RwLock::new(None),
        }
    }

    /// Returns the saved addresses, fetching once per session.
    #[instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Address>, CheckoutError> {
        if let Some(book) = self.book.read().unwrap().clone() {
            return Ok(book);
        }

        let book = self.api.list_addresses().await?;
        *self.book.write().unwrap() = Some(book.clone());
        Ok(book)
    }

    /// The account's default address, if any. Computed from the book on
    /// demand; checkout runs this exactly once when the draft is created.
    pub async fn default_address(&self) -> Result<Option<Address>, CheckoutError> {
        Ok(self.list().await?.into_iter().find(|a| a.is_default))
    }

    pub async fn find(&self, id: Uuid) -> Result<Option<Address>, CheckoutError> {
        Ok(self.list().await?.into_iter().find(|a| a.id == Some(id)))
    }

    /// Saves a new address and appends it to the cached book.
    #[instrument(skip(self, address))]
    pub async fn create(&self, address: Address) -> Result<Address, CheckoutError> {
        address.validate()?;
        let created = self.api.create_address(&address).await?;

        if let Some(book) = self.book.write().unwrap().as_mut() {
            book.push(created.clone());
        }
        info!(address_id = ?created.id, "Saved new address");
        Ok(created)
    }

    #[instrument(skip(self, address))]
    pub async fn update(&self, address: Address) -> Result<Address, CheckoutError> {
        address.validate()?;
        let id = address.id.ok_or_else(|| {
            CheckoutError::Validation("Cannot update an address without an id".to_string())
        })?;
        let saved = self.api.update_address(&address).await?;

        if let Some(book) = self.book.write().unwrap().as_mut() {
            if let Some(slot) = book.iter_mut().find(|a| a.id == Some(id)) {
                *slot = saved.clone();
            }
        }
        Ok(saved)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), CheckoutError> {
        self.api.delete_address(id).await?;

        if let Some(book) = self.book.write().unwrap().as_mut() {
            book.retain(|a| a.id != Some(id));
        }
        Ok(())
    }

    /// Marks an address as the account default.
    ///
    /// The cached book is flipped first so the UI reflects the choice
    /// immediately; if the remote mutation fails the previous book is
    /// restored and the error surfaces.
    #[instrument(skip(self))]
    pub async fn set_default(&self, id: Uuid) -> Result<(), CheckoutError> {
        self.list().await?;

        let (previous, target) = {
            let mut guard = self.book.write().unwrap();
            let book = guard.as_mut().ok_or_else(|| {
                CheckoutError::InvalidOperation("Address book is not loaded".to_string())
            })?;
            let position = book
                .iter()
                .position(|a| a.id == Some(id))
                .ok_or_else(|| CheckoutError::NotFound(format!("Address {} not found", id)))?;

            let previous = book.clone();
            for address in book.iter_mut() {
                address.is_default = address.id == Some(id);
            }
            (previous, book[position].clone())
        };

        match self.api.update_address(&target).await {
            Ok(saved) => {
                if let Some(book) = self.book.write().unwrap().as_mut() {
                    if let Some(slot) = book.iter_mut().find(|a| a.id == Some(id)) {
                        *slot = saved;
                    }
                }
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "Failed to persist default address, rolling back");
                *self.book.write().unwrap() = Some(previous);
                Err(err)
            }
        }
    }

    /// Forgets the cached book. Called after a verified payment, when the
    /// default flag may have changed server-side.
    pub fn invalidate(&self) {
        *self.book.write().unwrap() = None;
    }
}
