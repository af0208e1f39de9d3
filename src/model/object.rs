// SPDX-License-Identifier: Apache-2.0

//! Type-tagged 64-bit handles and the append-only arenas they resolve into.
//!
//! A handle packs an object tag into bits 63..56 and a slot index into the
//! low bits; the all-zero value is the null handle. Records are stored in
//! fixed-capacity pages that never reallocate, so a handle handed out once
//! stays valid for the life of its [`ObjectStore`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use ahash::AHashMap;

use crate::model::celltype::{CellProperties, CellSymbol, CellType};
use crate::model::subnet::Subnet;

pub const TAG_SHIFT: u32 = 56;
pub const INDEX_MASK: u64 = (1u64 << TAG_SHIFT) - 1;

/// Records per arena page.
const PAGE_CAPACITY: usize = 1024;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectTag {
    Null = 0,
    CellType = 2,
    Subnet = 7,
    String = 8,
}

impl fmt::Display for ObjectTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ObjectTag::Null => "null",
            ObjectTag::CellType => "cell-type",
            ObjectTag::Subnet => "subnet",
            ObjectTag::String => "string",
        };
        write!(f, "{}", s)
    }
}

/// Handle of a built-in cell type. Valid in every [`ObjectStore`], which
/// registers the built-ins first and in [`CellSymbol::BUILTINS`] order.
pub fn builtin_cell_type(symbol: CellSymbol) -> CellTypeId {
    assert!(
        symbol != CellSymbol::Cell,
        "composite cells have no built-in type"
    );
    CellTypeId::from_index(symbol as usize)
}

/// Implemented by every record kind that lives in an [`ObjectStore`].
pub trait Tagged {
    const TAG: ObjectTag;
}

pub struct ObjectId<T> {
    raw: u64,
    _marker: PhantomData<fn() -> T>,
}

pub type CellTypeId = ObjectId<CellType>;
pub type SubnetId = ObjectId<Subnet>;
pub type StringId = ObjectId<String>;

impl Tagged for CellType {
    const TAG: ObjectTag = ObjectTag::CellType;
}

impl Tagged for Subnet {
    const TAG: ObjectTag = ObjectTag::Subnet;
}

impl Tagged for String {
    const TAG: ObjectTag = ObjectTag::String;
}

impl<T: Tagged> ObjectId<T> {
    pub const fn null() -> Self {
        Self {
            raw: 0,
            _marker: PhantomData,
        }
    }

    fn from_index(index: usize) -> Self {
        assert!(
            (index as u64) <= INDEX_MASK,
            "{} slot index {} does not fit in a handle",
            T::TAG,
            index
        );
        Self {
            raw: ((T::TAG as u64) << TAG_SHIFT) | index as u64,
            _marker: PhantomData,
        }
    }

    /// Re-types a raw handle value; panics if the tag does not match `T`.
    pub fn from_raw(raw: u64) -> Self {
        let tag = (raw >> TAG_SHIFT) as u8;
        assert!(
            raw == 0 || tag == T::TAG as u8,
            "handle {:#x} carries tag {} but a {} handle was expected",
            raw,
            tag,
            T::TAG
        );
        Self {
            raw,
            _marker: PhantomData,
        }
    }

    /// Like [`ObjectId::from_raw`] but reports a tag mismatch instead of
    /// panicking.
    pub fn try_from_raw(raw: u64) -> Option<Self> {
        if raw != 0 && (raw >> TAG_SHIFT) as u8 == T::TAG as u8 {
            Some(Self {
                raw,
                _marker: PhantomData,
            })
        } else {
            None
        }
    }

    pub fn raw(self) -> u64 {
        self.raw
    }

    pub fn is_null(self) -> bool {
        self.raw == 0
    }

    pub fn index(self) -> usize {
        (self.raw & INDEX_MASK) as usize
    }
}

impl<T> Clone for ObjectId<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for ObjectId<T> {}

impl<T> PartialEq for ObjectId<T> {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl<T> Eq for ObjectId<T> {}

impl<T> PartialOrd for ObjectId<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for ObjectId<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.raw.cmp(&other.raw)
    }
}

impl<T> Hash for ObjectId<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.raw.hash(state);
    }
}

impl<T: Tagged> fmt::Debug for ObjectId<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "{}#null", T::TAG)
        } else {
            write!(f, "{}#{}", T::TAG, self.index())
        }
    }
}

/// Append-only paged storage. Pages are allocated at full capacity up front
/// and never grow past it, so references into a page are never invalidated
/// by later pushes.
pub struct Arena<T> {
    pages: Vec<Vec<T>>,
    len: usize,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            pages: Vec::new(),
            len: 0,
        }
    }

    pub fn push(&mut self, value: T) -> usize {
        let needs_page = self
            .pages
            .last()
            .map_or(true, |page| page.len() == PAGE_CAPACITY);
        if needs_page {
            self.pages.push(Vec::with_capacity(PAGE_CAPACITY));
        }
        let page_index = self.pages.len() - 1;
        self.pages[page_index].push(value);
        self.len += 1;
        self.len - 1
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.pages
            .get(index / PAGE_CAPACITY)
            .and_then(|page| page.get(index % PAGE_CAPACITY))
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Selects the arena a record kind lives in.
pub trait Stored: Tagged + Sized {
    fn arena(store: &ObjectStore) -> &Arena<Self>;
    fn arena_mut(store: &mut ObjectStore) -> &mut Arena<Self>;
}

impl Stored for CellType {
    fn arena(store: &ObjectStore) -> &Arena<Self> {
        &store.cell_types
    }
    fn arena_mut(store: &mut ObjectStore) -> &mut Arena<Self> {
        &mut store.cell_types
    }
}

impl Stored for Subnet {
    fn arena(store: &ObjectStore) -> &Arena<Self> {
        &store.subnets
    }
    fn arena_mut(store: &mut ObjectStore) -> &mut Arena<Self> {
        &mut store.subnets
    }
}

impl Stored for String {
    fn arena(store: &ObjectStore) -> &Arena<Self> {
        &store.strings
    }
    fn arena_mut(store: &mut ObjectStore) -> &mut Arena<Self> {
        &mut store.strings
    }
}

/// Owns every cell type, subnet and interned string of a synthesis session.
///
/// Built-in cell types are registered on construction in [`CellSymbol`]
/// order, so the handle of a built-in symbol is the same in every store.
pub struct ObjectStore {
    cell_types: Arena<CellType>,
    subnets: Arena<Subnet>,
    strings: Arena<String>,
    string_index: AHashMap<String, StringId>,
    type_by_name: AHashMap<String, CellTypeId>,
}

impl ObjectStore {
    pub fn new() -> Self {
        let mut store = Self {
            cell_types: Arena::new(),
            subnets: Arena::new(),
            strings: Arena::new(),
            string_index: AHashMap::new(),
            type_by_name: AHashMap::new(),
        };
        for symbol in CellSymbol::BUILTINS {
            let (in_min, in_max) = symbol.arity_bounds();
            let name = store.intern(symbol.name());
            let id = store.register_cell_type(CellType {
                name,
                symbol,
                in_min,
                in_max,
                out_num: if symbol == CellSymbol::Out { 0 } else { 1 },
                props: symbol.properties(),
                impl_subnet: None,
                attrs: None,
            });
            debug_assert_eq!(id, builtin_cell_type(symbol));
        }
        store
    }

    pub fn allocate<T: Stored>(&mut self, record: T) -> ObjectId<T> {
        let index = T::arena_mut(self).push(record);
        ObjectId::from_index(index)
    }

    /// Resolves a handle; null, mistagged and out-of-range handles are
    /// programming errors.
    pub fn get<T: Stored>(&self, id: ObjectId<T>) -> &T {
        assert!(!id.is_null(), "null {} handle dereferenced", T::TAG);
        assert_eq!(
            (id.raw() >> TAG_SHIFT) as u8,
            T::TAG as u8,
            "handle {:#x} does not name a {}",
            id.raw(),
            T::TAG
        );
        match T::arena(self).get(id.index()) {
            Some(record) => record,
            None => panic!(
                "{} handle {:#x} is out of bounds (len {})",
                T::TAG,
                id.raw(),
                T::arena(self).len()
            ),
        }
    }

    /// Non-panicking resolution of a raw handle read from outside the
    /// process (serialized data).
    pub fn resolve_raw<T: Stored>(&self, raw: u64) -> Option<ObjectId<T>> {
        let id = ObjectId::<T>::try_from_raw(raw)?;
        T::arena(self).get(id.index()).map(|_| id)
    }

    pub fn len<T: Stored>(&self) -> usize {
        T::arena(self).len()
    }

    pub fn intern(&mut self, s: &str) -> StringId {
        if let Some(id) = self.string_index.get(s) {
            return *id;
        }
        let id = self.allocate(s.to_string());
        self.string_index.insert(s.to_string(), id);
        id
    }

    pub fn string(&self, id: StringId) -> &str {
        self.get(id).as_str()
    }

    pub fn register_cell_type(&mut self, cell_type: CellType) -> CellTypeId {
        let name = self.string(cell_type.name).to_string();
        let id = self.allocate(cell_type);
        self.type_by_name.entry(name).or_insert(id);
        id
    }

    /// Registers a composite type implemented by `impl_subnet`.
    pub fn register_composite(
        &mut self,
        name: &str,
        impl_subnet: SubnetId,
        attrs: Option<crate::model::celltype::CellAttrs>,
    ) -> CellTypeId {
        let (in_num, out_num) = {
            let subnet = self.get(impl_subnet);
            (subnet.in_num() as u16, subnet.out_num() as u16)
        };
        let name = self.intern(name);
        self.register_cell_type(CellType {
            name,
            symbol: CellSymbol::Cell,
            in_min: in_num,
            in_max: in_num,
            out_num,
            props: CellProperties {
                combinational: true,
                ..CellProperties::default()
            },
            impl_subnet: Some(impl_subnet),
            attrs,
        })
    }

    /// Handle of a built-in symbol's cell type.
    pub fn cell_type_of(&self, symbol: CellSymbol) -> CellTypeId {
        builtin_cell_type(symbol)
    }

    pub fn cell_type(&self, id: CellTypeId) -> &CellType {
        self.get(id)
    }

    pub fn cell_type_name(&self, id: CellTypeId) -> &str {
        self.string(self.get(id).name)
    }

    pub fn find_cell_type(&self, name: &str) -> Option<CellTypeId> {
        self.type_by_name.get(name).copied()
    }

    pub fn subnet(&self, id: SubnetId) -> &Subnet {
        self.get(id)
    }
}

impl Default for ObjectStore {
    fn default() -> Self {
        Self::new()
    }
}
