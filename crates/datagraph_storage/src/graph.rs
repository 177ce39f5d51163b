//! The entity graph: a rooted DAG of named entities with shared ownership.
//!
//! An entity may have several parents. It stays alive while at least one
//! parent holds it; removing its last parent removes it, and the rule
//! cascades through children (last-parent rule). Entity and child maps are
//! persistent (`im`), so [`Clone`] on a graph is cheap and shares stores.

use std::sync::Arc;

use datagraph_foundation::{DataPath, EntityId, Error, ErrorKind, Result, validate_name};
use im::{HashMap, OrdMap, OrdSet};
use tracing::debug;

use crate::array::DataStore;
use crate::entity::{AttributeTable, Entity, EntityKind, Payload};
use crate::geometry::Geometry;
use crate::strings::StringStore;
use crate::typed::{StoreElement, TypedArray, TypedList};

/// A graph of entities rooted at [`EntityId::ROOT`].
#[derive(Clone, Debug)]
pub struct DataGraph {
    entities: HashMap<EntityId, Entity>,
    root: OrdMap<String, EntityId>,
    next_id: EntityId,
}

impl Default for DataGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl DataGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entities: HashMap::new(),
            root: OrdMap::new(),
            next_id: EntityId::FIRST,
        }
    }

    /// The id the next created entity will receive.
    #[must_use]
    pub fn next_id(&self) -> EntityId {
        self.next_id
    }

    /// Raises the id counter to at least `next`. Never lowers it.
    pub fn set_next_id(&mut self, next: EntityId) {
        if next > self.next_id {
            self.next_id = next;
        }
    }

    /// Number of live entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Returns true if the graph holds no entities.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Returns true if `id` names a live entity.
    #[must_use]
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(&id)
    }

    /// Looks up an entity.
    ///
    /// # Errors
    ///
    /// Returns an error if no entity has this id.
    pub fn get(&self, id: EntityId) -> Result<&Entity> {
        self.entities.get(&id).ok_or_else(|| Error::entity_not_found(id))
    }

    fn get_mut(&mut self, id: EntityId) -> Result<&mut Entity> {
        self.entities.get_mut(&id).ok_or_else(|| Error::entity_not_found(id))
    }

    /// The type tag of a live entity.
    #[must_use]
    pub fn kind(&self, id: EntityId) -> Option<EntityKind> {
        self.entities.get(&id).map(Entity::kind)
    }

    /// Every live id, ascending.
    #[must_use]
    pub fn ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<_> = self.entities.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Every live entity, in id order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> + '_ {
        self.ids().into_iter().filter_map(move |id| self.entities.get(&id))
    }

    /// Top-level children by name.
    #[must_use]
    pub fn top_level(&self) -> &OrdMap<String, EntityId> {
        &self.root
    }

    /// Children of `parent` (which may be [`EntityId::ROOT`]) by name.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` does not exist.
    pub fn child_map(&self, parent: EntityId) -> Result<&OrdMap<String, EntityId>> {
        if parent.is_root() {
            Ok(&self.root)
        } else {
            self.get(parent).map(Entity::children)
        }
    }

    /// Child ids of `parent` in name order.
    ///
    /// # Errors
    ///
    /// Returns an error if `parent` does not exist.
    pub fn children(&self, parent: EntityId) -> Result<Vec<EntityId>> {
        Ok(self.child_map(parent)?.values().copied().collect())
    }

    /// The child of `parent` named `name`, if any.
    #[must_use]
    pub fn child(&self, parent: EntityId, name: &str) -> Option<EntityId> {
        self.child_map(parent).ok()?.get(name).copied()
    }

    fn child_map_mut(&mut self, parent: EntityId) -> Result<&mut OrdMap<String, EntityId>> {
        if parent.is_root() {
            Ok(&mut self.root)
        } else {
            Ok(&mut self.get_mut(parent)?.children)
        }
    }

    /// Checks that `parent` can take a child named `name` with `payload`.
    fn check_attach(&self, parent: EntityId, name: &str, payload: &Payload) -> Result<()> {
        if !parent.is_root() {
            let entity = self
                .entities
                .get(&parent)
                .ok_or_else(|| Error::unknown_parent(parent))?;
            if !entity.kind().is_container() {
                return Err(Error::new(ErrorKind::NotAContainer(parent)));
            }
            if let (Payload::AttributeTable(table), Some(count)) = (&entity.payload, payload.tuple_count()) {
                if count != table.num_tuples() {
                    return Err(Error::shape_mismatch(table.tuple_shape(), &[count]).at_object(name));
                }
            }
        }
        if self.child_map(parent)?.contains_key(name) {
            return Err(Error::name_collision(parent, name));
        }
        Ok(())
    }

    fn insert(&mut self, parent: EntityId, name: &str, id: EntityId, payload: Payload) -> Result<EntityId> {
        validate_name(name)?;
        self.check_attach(parent, name, &payload)?;
        let mut entity = Entity::new(id, name.to_string(), payload);
        entity.parents.insert(parent);
        self.entities.insert(id, entity);
        self.child_map_mut(parent)?.insert(name.to_string(), id);
        Ok(id)
    }

    /// Creates an entity under `parent` and returns its new id.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or taken, the parent is
    /// unknown or cannot hold children, or a store's tuple count disagrees
    /// with a parent attribute table.
    pub fn create(&mut self, parent: EntityId, name: &str, payload: Payload) -> Result<EntityId> {
        let id = self.next_id;
        self.insert(parent, name, id, payload)?;
        self.next_id = id.next();
        Ok(id)
    }

    /// Creates an entity with a recorded id, as a reader does.
    ///
    /// The id counter is raised past `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is the root or already live, or for any
    /// reason [`DataGraph::create`] fails.
    pub fn import(&mut self, parent: EntityId, name: &str, id: EntityId, payload: Payload) -> Result<EntityId> {
        if id.is_root() || self.contains(id) {
            return Err(Error::invalid_format(format!("duplicate entity id {id}")));
        }
        self.insert(parent, name, id, payload)?;
        self.set_next_id(id.next());
        Ok(id)
    }

    /// Creates a group.
    ///
    /// # Errors
    ///
    /// See [`DataGraph::create`].
    pub fn create_group(&mut self, parent: EntityId, name: &str) -> Result<EntityId> {
        self.create(parent, name, Payload::Group)
    }

    /// Creates an array entity.
    ///
    /// # Errors
    ///
    /// See [`DataGraph::create`].
    pub fn create_array(&mut self, parent: EntityId, name: &str, store: impl Into<TypedArray>) -> Result<EntityId> {
        self.create(parent, name, Payload::Array(Arc::new(store.into())))
    }

    /// Creates a scalar entity holding `value`.
    ///
    /// # Errors
    ///
    /// See [`DataGraph::create`].
    pub fn create_scalar<T: StoreElement>(&mut self, parent: EntityId, name: &str, value: T) -> Result<EntityId> {
        let store = DataStore::from_vec(vec![1], vec![1], vec![value])?;
        self.create(parent, name, Payload::Scalar(Arc::new(store.into())))
    }

    /// Creates a list entity.
    ///
    /// # Errors
    ///
    /// See [`DataGraph::create`].
    pub fn create_list(&mut self, parent: EntityId, name: &str, store: impl Into<TypedList>) -> Result<EntityId> {
        self.create(parent, name, Payload::List(Arc::new(store.into())))
    }

    /// Creates a string array entity.
    ///
    /// # Errors
    ///
    /// See [`DataGraph::create`].
    pub fn create_strings(&mut self, parent: EntityId, name: &str, store: StringStore) -> Result<EntityId> {
        self.create(parent, name, Payload::Strings(Arc::new(store)))
    }

    /// Creates an attribute table with the given tuple shape.
    ///
    /// # Errors
    ///
    /// See [`DataGraph::create`].
    pub fn create_attribute_table(&mut self, parent: EntityId, name: &str, tuple_shape: Vec<usize>) -> Result<EntityId> {
        self.create(parent, name, Payload::AttributeTable(AttributeTable::new(tuple_shape)))
    }

    /// Creates a geometry.
    ///
    /// # Errors
    ///
    /// See [`DataGraph::create`].
    pub fn create_geometry(&mut self, parent: EntityId, name: &str, geometry: Geometry) -> Result<EntityId> {
        self.create(parent, name, Payload::Geometry(geometry))
    }

    /// Returns true if `ancestor` is `id` or lies above it.
    fn is_ancestor_or_self(&self, ancestor: EntityId, id: EntityId) -> bool {
        let mut stack = vec![id];
        let mut seen = OrdSet::new();
        while let Some(current) = stack.pop() {
            if current == ancestor {
                return true;
            }
            if seen.insert(current).is_some() {
                continue;
            }
            if let Some(entity) = self.entities.get(&current) {
                stack.extend(entity.parents.iter().filter(|p| !p.is_root()).copied());
            }
        }
        false
    }

    /// Gives `id` an additional parent. Adding an existing parent is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if either entity is unknown, the parent is `id` or
    /// one of its descendants, or the parent already has a child with this
    /// name.
    pub fn add_parent(&mut self, id: EntityId, parent: EntityId) -> Result<()> {
        let entity = self.get(id)?;
        if entity.parents.contains(&parent) {
            return Ok(());
        }
        let name = entity.name.clone();
        let payload = entity.payload.clone();
        if !parent.is_root() && self.is_ancestor_or_self(id, parent) {
            return Err(Error::cycle(id, parent));
        }
        self.check_attach(parent, &name, &payload)?;
        self.child_map_mut(parent)?.insert(name, id);
        self.get_mut(id)?.parents.insert(parent);
        Ok(())
    }

    /// Detaches `id` from `parent`. Removing the last parent removes `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or `parent` is not one of its
    /// parents.
    pub fn remove_parent(&mut self, id: EntityId, parent: EntityId) -> Result<()> {
        let entity = self.get(id)?;
        if !entity.parents.contains(&parent) {
            return Err(Error::unknown_parent(parent));
        }
        if entity.parents.len() == 1 {
            return self.remove(id);
        }
        let name = entity.name.clone();
        self.child_map_mut(parent)?.remove(&name);
        self.get_mut(id)?.parents.remove(&parent);
        Ok(())
    }

    /// Removes `id` from every parent and frees it. Children whose only
    /// remaining parent was `id` are removed too.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown.
    pub fn remove(&mut self, id: EntityId) -> Result<()> {
        let entity = self.entities.remove(&id).ok_or_else(|| Error::entity_not_found(id))?;
        for parent in &entity.parents {
            if let Ok(map) = self.child_map_mut(*parent) {
                map.remove(&entity.name);
            }
        }

        let mut removed = 1usize;
        let mut orphans: Vec<(EntityId, EntityId)> = entity.children.values().map(|c| (id, *c)).collect();
        while let Some((former, child)) = orphans.pop() {
            let Some(entry) = self.entities.get_mut(&child) else {
                continue;
            };
            entry.parents.remove(&former);
            if entry.parents.is_empty() {
                if let Some(gone) = self.entities.remove(&child) {
                    removed += 1;
                    orphans.extend(gone.children.values().map(|c| (child, *c)));
                }
            }
        }
        debug!(%id, removed, "removed entity");
        Ok(())
    }

    /// Renames `id` under every parent.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is invalid or taken under any parent.
    pub fn rename(&mut self, id: EntityId, name: &str) -> Result<()> {
        validate_name(name)?;
        let entity = self.get(id)?;
        if entity.name == name {
            return Ok(());
        }
        let old = entity.name.clone();
        let parents: Vec<EntityId> = entity.parents.iter().copied().collect();
        for parent in &parents {
            if self.child_map(*parent)?.contains_key(name) {
                return Err(Error::name_collision(*parent, name));
            }
        }
        for parent in parents {
            let map = self.child_map_mut(parent)?;
            map.remove(&old);
            map.insert(name.to_string(), id);
        }
        self.get_mut(id)?.name = name.to_string();
        Ok(())
    }

    /// Resolves a `/`-delimited path from the root.
    ///
    /// # Errors
    ///
    /// Returns an error if the path is malformed or any segment is missing.
    pub fn resolve(&self, path: &str) -> Result<EntityId> {
        self.resolve_path(&DataPath::parse(path)?)
    }

    /// Resolves a parsed path from the root.
    ///
    /// # Errors
    ///
    /// Returns an error if any segment is missing or the path is empty.
    pub fn resolve_path(&self, path: &DataPath) -> Result<EntityId> {
        let mut current = EntityId::ROOT;
        for segment in path.segments() {
            current = self
                .child(current, segment)
                .ok_or_else(|| Error::path_not_found(path.to_string()))?;
        }
        if current.is_root() {
            return Err(Error::path_not_found(path.to_string()));
        }
        Ok(current)
    }

    /// Every path from the root to `id`, sorted.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown.
    pub fn paths_to(&self, id: EntityId) -> Result<Vec<DataPath>> {
        let entity = self.get(id)?;
        let mut paths = Vec::new();
        for parent in &entity.parents {
            if parent.is_root() {
                paths.push(DataPath::root().join(&entity.name)?);
            } else {
                for prefix in self.paths_to(*parent)? {
                    paths.push(prefix.join(&entity.name)?);
                }
            }
        }
        paths.sort();
        Ok(paths)
    }

    /// Sets whether readers import `id`.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown.
    pub fn set_importable(&mut self, id: EntityId, importable: bool) -> Result<()> {
        self.get_mut(id)?.importable = importable;
        Ok(())
    }

    fn wrong_kind(&self, id: EntityId, expected: &str) -> Error {
        let actual = self.kind(id).map_or_else(|| "<none>".to_string(), |k| k.type_name());
        Error::type_mismatch(expected, actual).at_object(format!("{id}"))
    }

    /// The array store of an array entity.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or not an array.
    pub fn array(&self, id: EntityId) -> Result<&Arc<TypedArray>> {
        match &self.get(id)?.payload {
            Payload::Array(store) => Ok(store),
            _ => Err(self.wrong_kind(id, "DataArray")),
        }
    }

    /// The value of a scalar entity.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown, not a scalar, or holds another
    /// element type.
    pub fn scalar<T: StoreElement>(&self, id: EntityId) -> Result<T> {
        match &self.get(id)?.payload {
            Payload::Scalar(store) => store.as_store::<T>()?.get_flat(0),
            _ => Err(self.wrong_kind(id, "ScalarData")),
        }
    }

    /// The backing store of a scalar entity.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or not a scalar.
    pub fn scalar_store(&self, id: EntityId) -> Result<&Arc<TypedArray>> {
        match &self.get(id)?.payload {
            Payload::Scalar(store) => Ok(store),
            _ => Err(self.wrong_kind(id, "ScalarData")),
        }
    }

    /// The list store of a list entity.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or not a list.
    pub fn list(&self, id: EntityId) -> Result<&Arc<TypedList>> {
        match &self.get(id)?.payload {
            Payload::List(store) => Ok(store),
            _ => Err(self.wrong_kind(id, "NeighborList")),
        }
    }

    /// The string store of a string array entity.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or not a string array.
    pub fn strings(&self, id: EntityId) -> Result<&Arc<StringStore>> {
        match &self.get(id)?.payload {
            Payload::Strings(store) => Ok(store),
            _ => Err(self.wrong_kind(id, "StringArray")),
        }
    }

    /// An attribute table.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or not an attribute table.
    pub fn attribute_table(&self, id: EntityId) -> Result<&AttributeTable> {
        match &self.get(id)?.payload {
            Payload::AttributeTable(table) => Ok(table),
            _ => Err(self.wrong_kind(id, "AttributeMatrix")),
        }
    }

    /// A geometry.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or not a geometry.
    pub fn geometry(&self, id: EntityId) -> Result<&Geometry> {
        match &self.get(id)?.payload {
            Payload::Geometry(geometry) => Ok(geometry),
            _ => Err(self.wrong_kind(id, "geometry")),
        }
    }

    /// A geometry, mutably.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is unknown or not a geometry.
    pub fn geometry_mut(&mut self, id: EntityId) -> Result<&mut Geometry> {
        if !matches!(self.kind(id), Some(EntityKind::Geometry(_))) {
            return Err(self.wrong_kind(id, "geometry"));
        }
        match &mut self.get_mut(id)?.payload {
            Payload::Geometry(geometry) => Ok(geometry),
            _ => Err(Error::entity_not_found(id)),
        }
    }

    /// Resizes an attribute table and every store directly under it.
    ///
    /// Stores are shared with clones of this graph, which see the new size.
    ///
    /// # Errors
    ///
    /// Returns an error if `id` is not an attribute table or a child store
    /// cannot be resized.
    pub fn resize_attribute_table(&mut self, id: EntityId, tuple_shape: Vec<usize>) -> Result<()> {
        self.attribute_table(id)?;
        let count = datagraph_foundation::shape_len(&tuple_shape);
        for child in self.children(id)? {
            match &self.get(child)?.payload {
                Payload::Array(store) => store.resize_tuples(tuple_shape.clone())?,
                Payload::List(store) => store.resize_rows(tuple_shape.clone()),
                Payload::Strings(store) => store.resize(count),
                _ => {}
            }
        }
        if let Payload::AttributeTable(table) = &mut self.get_mut(id)?.payload {
            table.set_tuple_shape(tuple_shape);
        }
        debug!(%id, tuples = count, "resized attribute table");
        Ok(())
    }

    /// A copy of this graph that shares no stores with it.
    #[must_use]
    pub fn deep_copy(&self) -> Self {
        let entities = self
            .entities
            .iter()
            .map(|(id, entity)| {
                let mut copy = entity.clone();
                copy.payload = entity.payload.duplicate();
                (*id, copy)
            })
            .collect();
        Self {
            entities,
            root: self.root.clone(),
            next_id: self.next_id,
        }
    }
}
