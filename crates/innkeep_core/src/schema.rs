//! Collection declarations.
//!
//! The engine itself is schema-agnostic, but backends need to know each
//! collection's key field and, for the transactional store, which fields
//! carry secondary indexes. A [`StoreSchema`] bundles those declarations
//! with a version number; declarations only change through a version bump.

use serde::{Deserialize, Serialize};

/// Name of the collection that `clearAll` leaves untouched.
pub const PRESERVED_COLLECTION: &str = "settings";

/// A secondary lookup field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Index name.
    pub name: String,
    /// Indexed field.
    pub field: String,
    /// Whether two records may share a value.
    pub unique: bool,
}

impl IndexSpec {
    /// A non-unique index named after its field.
    pub fn on(field: &str) -> Self {
        Self {
            name: field.to_string(),
            field: field.to_string(),
            unique: false,
        }
    }

    /// A unique index named after its field.
    pub fn unique(field: &str) -> Self {
        Self {
            unique: true,
            ..Self::on(field)
        }
    }
}

/// Declaration of one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionSchema {
    /// Collection name.
    pub name: String,
    /// Field holding the record identifier.
    pub key_field: String,
    /// Whether the backend assigns numeric identifiers.
    pub auto_increment: bool,
    /// Secondary indexes.
    pub indexes: Vec<IndexSpec>,
}

impl CollectionSchema {
    /// A collection with numeric, backend-assigned identifiers.
    pub fn auto_increment(name: &str) -> Self {
        Self {
            name: name.to_string(),
            key_field: "id".to_string(),
            auto_increment: true,
            indexes: Vec::new(),
        }
    }

    /// A collection whose identifiers come from the caller.
    pub fn caller_keyed(name: &str) -> Self {
        Self {
            auto_increment: false,
            ..Self::auto_increment(name)
        }
    }

    /// Sets the key field.
    #[must_use]
    pub fn key_field(mut self, field: &str) -> Self {
        self.key_field = field.to_string();
        self
    }

    /// Adds an index.
    #[must_use]
    pub fn index(mut self, index: IndexSpec) -> Self {
        self.indexes.push(index);
        self
    }

    /// Returns the index covering `field`, if any.
    pub fn index_for(&self, field: &str) -> Option<&IndexSpec> {
        self.indexes.iter().find(|i| i.field == field)
    }
}

/// A versioned set of collection declarations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSchema {
    /// Schema version. Declarations change only with a higher version.
    pub version: u32,
    /// Declared collections, in export order.
    pub collections: Vec<CollectionSchema>,
}

impl StoreSchema {
    /// Creates a schema.
    pub fn new(version: u32, collections: Vec<CollectionSchema>) -> Self {
        Self {
            version,
            collections,
        }
    }

    /// The property-management collections: bookings, payments, expenses,
    /// settings, rooms, guests, tasks and inventory.
    pub fn property_management() -> Self {
        Self::new(
            2,
            vec![
                CollectionSchema::auto_increment("bookings")
                    .index(IndexSpec::on("guestId"))
                    .index(IndexSpec::on("bookingDate"))
                    .index(IndexSpec::on("status")),
                CollectionSchema::auto_increment("payments")
                    .index(IndexSpec::on("bookingId"))
                    .index(IndexSpec::on("paymentDate")),
                CollectionSchema::auto_increment("expenses")
                    .index(IndexSpec::on("category"))
                    .index(IndexSpec::on("expenseDate")),
                CollectionSchema::caller_keyed("settings").key_field("key"),
                CollectionSchema::caller_keyed("rooms")
                    .index(IndexSpec::on("type"))
                    .index(IndexSpec::on("status"))
                    .index(IndexSpec::unique("number")),
                CollectionSchema::caller_keyed("guests")
                    .index(IndexSpec::on("name"))
                    .index(IndexSpec::on("phone"))
                    .index(IndexSpec::unique("idCard")),
                CollectionSchema::caller_keyed("tasks")
                    .index(IndexSpec::on("type"))
                    .index(IndexSpec::on("status"))
                    .index(IndexSpec::on("priority"))
                    .index(IndexSpec::on("roomId")),
                CollectionSchema::caller_keyed("inventory")
                    .index(IndexSpec::on("item"))
                    .index(IndexSpec::on("category")),
            ],
        )
    }

    /// Looks up a collection by name.
    pub fn collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.iter().find(|c| c.name == name)
    }

    /// Iterates collection names in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.collections.iter().map(|c| c.name.as_str())
    }

    /// Iterates the collections `clearAll` and the stats panel cover.
    pub fn data_collections(&self) -> impl Iterator<Item = &CollectionSchema> {
        self.collections
            .iter()
            .filter(|c| c.name != PRESERVED_COLLECTION)
    }
}

impl Default for StoreSchema {
    fn default() -> Self {
        Self::property_management()
    }
}
