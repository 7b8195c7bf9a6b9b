//! The shader type system, as seen by the IR.
//!
//! The IR does not interpret types beyond a handful of structural queries
//! (array element, struct field lookup, voidness), but deref chains and call
//! signatures record them, and the validator checks them for consistency.
//! Types are interned in a [`TypeStore`]: equal type shapes always produce
//! equal [`Type`] handles, so handle comparison is type identity — the same
//! flyweight property a pointer-interned type system gives a C front-end.

use crate::ir::entities::Type;
use glint_entity::PrimaryMap;
use rustc_hash::FxHashMap;

/// The four scalar component kinds a shader value can have.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum ScalarKind {
    /// 32-bit IEEE float.
    Float,
    /// 32-bit signed integer.
    Int,
    /// 32-bit unsigned integer.
    Uint,
    /// Boolean.
    Bool,
}

/// Sampler dimensionality.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum SamplerDim {
    /// 1D texture.
    D1,
    /// 2D texture.
    D2,
    /// 3D texture.
    D3,
    /// Cube map.
    Cube,
}

/// One named member of a struct type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct StructField {
    /// Declared field name.
    pub name: String,
    /// Field type.
    pub ty: Type,
}

/// The shape of an interned type.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum TypeData {
    /// The void type; only meaningful as a function return type.
    Void,
    /// A single scalar.
    Scalar(ScalarKind),
    /// A vector of 2–4 scalars.
    Vector(ScalarKind, u8),
    /// A float matrix with `cols` columns of `rows` components each.
    Matrix {
        /// Number of columns (2–4).
        cols: u8,
        /// Number of rows (2–4).
        rows: u8,
    },
    /// A fixed-size array.
    Array {
        /// Element type.
        elem: Type,
        /// Number of elements.
        len: u32,
    },
    /// A struct with named fields.
    Struct {
        /// Declared struct name.
        name: String,
        /// Members in declaration order.
        fields: Vec<StructField>,
    },
    /// A texture sampler.
    Sampler {
        /// Texture dimensionality.
        dim: SamplerDim,
        /// Whether this is a shadow (depth-comparison) sampler.
        shadow: bool,
    },
}

/// Interning store for all types used by one shader.
///
/// The common built-ins are interned at construction so their accessors work
/// on a shared reference; composite types are interned on demand.
pub struct TypeStore {
    data: PrimaryMap<Type, TypeData>,
    interned: FxHashMap<TypeData, Type>,
    void: Type,
    scalars: [Type; 4],
    vectors: [[Type; 3]; 4],
}

impl TypeStore {
    /// Create a store with the built-in scalar and vector types interned.
    pub fn new() -> Self {
        let mut store = Self {
            data: PrimaryMap::new(),
            interned: FxHashMap::default(),
            void: Type::from_u32(0),
            scalars: [Type::from_u32(0); 4],
            vectors: [[Type::from_u32(0); 3]; 4],
        };
        store.void = store.intern(TypeData::Void);
        for (i, kind) in KINDS.iter().enumerate() {
            store.scalars[i] = store.intern(TypeData::Scalar(*kind));
            for n in 2..=4u8 {
                store.vectors[i][n as usize - 2] = store.intern(TypeData::Vector(*kind, n));
            }
        }
        store
    }

    fn intern(&mut self, data: TypeData) -> Type {
        if let Some(&ty) = self.interned.get(&data) {
            return ty;
        }
        let ty = self.data.push(data.clone());
        self.interned.insert(data, ty);
        ty
    }

    /// Look at the shape of `ty`.
    pub fn data(&self, ty: Type) -> &TypeData {
        &self.data[ty]
    }

    /// The void type.
    pub fn void(&self) -> Type {
        self.void
    }

    /// The scalar type of the given kind.
    pub fn scalar(&self, kind: ScalarKind) -> Type {
        self.scalars[kind_index(kind)]
    }

    /// `float`.
    pub fn float(&self) -> Type {
        self.scalar(ScalarKind::Float)
    }

    /// `int`.
    pub fn int(&self) -> Type {
        self.scalar(ScalarKind::Int)
    }

    /// `uint`.
    pub fn uint(&self) -> Type {
        self.scalar(ScalarKind::Uint)
    }

    /// `bool`.
    pub fn bool(&self) -> Type {
        self.scalar(ScalarKind::Bool)
    }

    /// A vector of `n` components of the given kind; `n` must be 2–4.
    pub fn vector(&self, kind: ScalarKind, n: u8) -> Type {
        assert!((2..=4).contains(&n), "vector width {} out of range", n);
        self.vectors[kind_index(kind)][n as usize - 2]
    }

    /// `vecN`.
    pub fn vec(&self, n: u8) -> Type {
        self.vector(ScalarKind::Float, n)
    }

    /// `ivecN`.
    pub fn ivec(&self, n: u8) -> Type {
        self.vector(ScalarKind::Int, n)
    }

    /// `uvecN`.
    pub fn uvec(&self, n: u8) -> Type {
        self.vector(ScalarKind::Uint, n)
    }

    /// `bvecN`.
    pub fn bvec(&self, n: u8) -> Type {
        self.vector(ScalarKind::Bool, n)
    }

    /// A float matrix type.
    pub fn matrix(&mut self, cols: u8, rows: u8) -> Type {
        assert!((2..=4).contains(&cols) && (2..=4).contains(&rows));
        self.intern(TypeData::Matrix { cols, rows })
    }

    /// An array of `len` elements of `elem`.
    pub fn array_of(&mut self, elem: Type, len: u32) -> Type {
        self.intern(TypeData::Array { elem, len })
    }

    /// A struct type with the given name and fields.
    pub fn struct_of(&mut self, name: &str, fields: Vec<StructField>) -> Type {
        self.intern(TypeData::Struct {
            name: name.to_string(),
            fields,
        })
    }

    /// A sampler type.
    pub fn sampler(&mut self, dim: SamplerDim, shadow: bool) -> Type {
        self.intern(TypeData::Sampler { dim, shadow })
    }

    /// Is `ty` the void type?
    pub fn is_void(&self, ty: Type) -> bool {
        ty == self.void
    }

    /// Is `ty` a sampler type?
    pub fn is_sampler(&self, ty: Type) -> bool {
        matches!(self.data[ty], TypeData::Sampler { .. })
    }

    /// The element type of an array, or `None` if `ty` is not an array.
    pub fn array_element(&self, ty: Type) -> Option<Type> {
        match self.data[ty] {
            TypeData::Array { elem, .. } => Some(elem),
            _ => None,
        }
    }

    /// The length of an array, or `None` if `ty` is not an array.
    pub fn array_len(&self, ty: Type) -> Option<u32> {
        match self.data[ty] {
            TypeData::Array { len, .. } => Some(len),
            _ => None,
        }
    }

    /// The type of the named field, or `None` if `ty` is not a struct or has
    /// no such field.
    pub fn struct_field(&self, ty: Type, field: &str) -> Option<Type> {
        match &self.data[ty] {
            TypeData::Struct { fields, .. } => {
                fields.iter().find(|f| f.name == field).map(|f| f.ty)
            }
            _ => None,
        }
    }

    /// Number of vector components of `ty`: 1 for scalars, the lane count
    /// for vectors, `None` for anything else.
    pub fn components(&self, ty: Type) -> Option<u8> {
        match self.data[ty] {
            TypeData::Scalar(_) => Some(1),
            TypeData::Vector(_, n) => Some(n),
            _ => None,
        }
    }
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

const KINDS: [ScalarKind; 4] = [
    ScalarKind::Float,
    ScalarKind::Int,
    ScalarKind::Uint,
    ScalarKind::Bool,
];

fn kind_index(kind: ScalarKind) -> usize {
    match kind {
        ScalarKind::Float => 0,
        ScalarKind::Int => 1,
        ScalarKind::Uint => 2,
        ScalarKind::Bool => 3,
    }
}
