use indexmap::IndexMap;

/// Physical name and column clause registered for a logical table id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableDescriptor {
    /// Physical table name used in statements.
    pub name: String,
    /// Column clause placed inside `CREATE TABLE ( … )`.
    pub fields: String,
}

/// Mapping from logical table ids to their physical descriptors, kept in registration order.
#[derive(Debug, Default)]
pub struct TableRegistry {
    tables: IndexMap<String, TableDescriptor>,
}

impl TableRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or overwrite the descriptor for `id`. Re-registering keeps the original position.
    pub fn register(&mut self, id: &str, name: &str, fields: &str) {
        self.tables.insert(
            id.to_owned(),
            TableDescriptor {
                name: name.to_owned(),
                fields: fields.to_owned(),
            },
        );
    }

    /// Physical table name for `id`.
    ///
    /// # Panics
    ///
    /// Panics when `id` has not been registered.
    pub fn name(&self, id: &str) -> &str {
        match self.tables.get(id) {
            Some(table) => &table.name,
            None => panic!("{id} table has not been registered!"),
        }
    }

    /// Column clause for `id`.
    ///
    /// # Panics
    ///
    /// Panics when `id` has not been registered.
    pub fn fields(&self, id: &str) -> &str {
        match self.tables.get(id) {
            Some(table) => &table.fields,
            None => panic!("{id} table fields have not been registered!"),
        }
    }

    /// Replace the physical name of `id`. Panics if `id` is unknown.
    pub fn set_name(&mut self, id: &str, name: &str) {
        self.entry_mut(id).name = name.to_owned();
    }

    /// Replace the column clause of `id`. Panics if `id` is unknown.
    pub fn set_fields(&mut self, id: &str, fields: &str) {
        self.entry_mut(id).fields = fields.to_owned();
    }

    /// Registered ids in registration order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.tables.keys().map(String::as_str)
    }

    /// Number of registered tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether no table has been registered.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    fn entry_mut(&mut self, id: &str) -> &mut TableDescriptor {
        match self.tables.get_mut(id) {
            Some(table) => table,
            None => panic!("{id} has not been registered!"),
        }
    }
}
