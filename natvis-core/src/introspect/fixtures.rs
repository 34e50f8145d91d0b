//! Hand-built process image shared by unit tests

use std::cell::Cell;

use super::{
    FieldDescriptor, IntrospectError, Introspector, Scalar, Snapshot, TypeCode, TypeDescriptor,
    TypeId, ValueHandle,
};

pub const POINT: u64 = 0x1000;
pub const ARRAY: u64 = 0x2000;
pub const VECTOR: u64 = 0x3000;
pub const EMPTY_VECTOR: u64 = 0x3100;
pub const DERIVED: u64 = 0x4000;
pub const NODE: u64 = 0x5000;
pub const STRING: u64 = 0x6000;
pub const NAMED: u64 = 0x6100;
pub const SHAPE: u64 = 0x7000;
pub const LINE: u64 = 0x8000;

pub struct Fixture {
    pub snapshot: Snapshot,
    pub int: TypeId,
    pub int_ptr: TypeId,
    pub char_ptr: TypeId,
    pub void_ptr: TypeId,
    pub point: TypeId,
    /// `Vector<int>` with the full name
    pub vector: TypeId,
    /// `Vector` with template arguments reported separately
    pub bare_vector: TypeId,
    /// `typedef Vector<int> IntVec`
    pub vector_alias: TypeId,
    pub vector_ptr: TypeId,
    pub derived: TypeId,
    pub node: TypeId,
    pub named: TypeId,
    pub shape: TypeId,
    pub circle: TypeId,
    pub line: TypeId,
}

impl Fixture {
    pub fn point(&self) -> ValueHandle {
        ValueHandle::new(POINT, self.point)
    }

    pub fn vector(&self) -> ValueHandle {
        ValueHandle::new(VECTOR, self.vector)
    }

    pub fn empty_vector(&self) -> ValueHandle {
        ValueHandle::new(EMPTY_VECTOR, self.vector)
    }

    pub fn derived(&self) -> ValueHandle {
        ValueHandle::new(DERIVED, self.derived)
    }

    pub fn node(&self) -> ValueHandle {
        ValueHandle::new(NODE, self.node)
    }

    pub fn named(&self) -> ValueHandle {
        ValueHandle::new(NAMED, self.named)
    }

    pub fn shape(&self) -> ValueHandle {
        ValueHandle::new(SHAPE, self.shape)
    }

    pub fn line(&self) -> ValueHandle {
        ValueHandle::new(LINE, self.line)
    }
}

pub fn build() -> Fixture {
    let mut s = Snapshot::new();
    let int = s.add_type(TypeDescriptor::scalar(TypeCode::Int, "int", 4));
    let uint = s.add_type(TypeDescriptor::scalar(TypeCode::UInt, "unsigned int", 4));
    let char_ty = s.add_type(TypeDescriptor::scalar(TypeCode::Char, "char", 1));
    let void = s.add_type(TypeDescriptor::scalar(TypeCode::Void, "void", 0));
    let int_ptr = s.add_type(TypeDescriptor::pointer(int));
    let char_ptr = s.add_type(TypeDescriptor::pointer(char_ty));
    let void_ptr = s.add_type(TypeDescriptor::pointer(void));

    let point = s.add_type(TypeDescriptor::structure(
        "Point",
        8,
        vec![
            FieldDescriptor::new("x", int, 0),
            FieldDescriptor::new("y", int, 4),
        ],
    ));

    let vector_fields = vec![
        FieldDescriptor::new("_first", int_ptr, 0),
        FieldDescriptor::new("_last", int_ptr, 8),
        FieldDescriptor::new("_size", int, 16),
    ];
    let vector = s.add_type(TypeDescriptor::structure(
        "Vector<int>",
        24,
        vector_fields.clone(),
    ));
    let bare_vector = s.add_type(TypeDescriptor {
        template_args: vec!["int".to_string()],
        ..TypeDescriptor::structure("Vector", 24, vector_fields)
    });
    let vector_alias = s.add_type(TypeDescriptor::typedef("IntVec", vector));
    let vector_ptr = s.add_type(TypeDescriptor::pointer(vector));

    let base = s.add_type(TypeDescriptor::structure(
        "Base",
        4,
        vec![FieldDescriptor::new("id", int, 0)],
    ));
    let union = s.add_type(TypeDescriptor {
        code: TypeCode::Union,
        name: None,
        ..TypeDescriptor::structure("", 4, vec![FieldDescriptor::new("raw", int, 0)])
    });
    let derived = s.add_type(TypeDescriptor::structure(
        "Derived",
        16,
        vec![
            FieldDescriptor::base(base, 0),
            FieldDescriptor::anonymous(union, 4),
            FieldDescriptor::new("value", int, 8),
            FieldDescriptor::bitfield("flags", uint, 12 * 8 + 3, 3),
        ],
    ));

    let node = TypeId(s.types.len() as u32 + 1);
    let node_ptr = s.add_type(TypeDescriptor::pointer(node));
    s.add_type(TypeDescriptor::structure(
        "Node",
        16,
        vec![
            FieldDescriptor::new("value", int, 0),
            FieldDescriptor::new("next", node_ptr, 8),
        ],
    ));

    let named = s.add_type(TypeDescriptor::structure(
        "Named",
        8,
        vec![FieldDescriptor::new("name", char_ptr, 0)],
    ));

    let shape = s.add_type(TypeDescriptor::structure(
        "Shape",
        4,
        vec![FieldDescriptor::new("kind", int, 0)],
    ));
    let circle = s.add_type(TypeDescriptor::structure(
        "Circle",
        8,
        vec![
            FieldDescriptor::base(shape, 0),
            FieldDescriptor::new("radius", int, 4),
        ],
    ));

    let line = s.add_type(TypeDescriptor::structure(
        "Line",
        16,
        vec![
            FieldDescriptor::new("start", point, 0),
            FieldDescriptor::new("end", point, 8),
        ],
    ));

    s.write_i32(POINT, 5);
    s.write_i32(POINT + 4, -2);

    let elements: Vec<u8> = [10i32, 20, 30, 40, 50, 60, 70]
        .iter()
        .flat_map(|v| v.to_le_bytes())
        .collect();
    s.write(ARRAY, &elements);

    s.write_u64(VECTOR, ARRAY);
    s.write_u64(VECTOR + 8, ARRAY + 12);
    s.write_i32(VECTOR + 16, 3);

    s.write_u64(EMPTY_VECTOR, ARRAY);
    s.write_u64(EMPTY_VECTOR + 8, ARRAY);
    s.write_i32(EMPTY_VECTOR + 16, 0);

    s.write_i32(DERIVED, 7);
    s.write_i32(DERIVED + 4, 9);
    s.write_i32(DERIVED + 8, 11);
    s.write(DERIVED + 12, &[5 << 3, 0, 0, 0]);

    // Two nodes pointing at each other
    s.write_i32(NODE, 1);
    s.write_u64(NODE + 8, NODE + 0x10);
    s.write_i32(NODE + 0x10, 2);
    s.write_u64(NODE + 0x18, NODE);

    s.write(STRING, b"hello\0");
    s.write_u64(NAMED, STRING);

    s.write_i32(SHAPE, 1);
    s.write_i32(SHAPE + 4, 12);
    s.set_dynamic_type(SHAPE, circle);

    for (offset, value) in [(0, 1), (4, 2), (8, 3), (12, 4)] {
        s.write_i32(LINE + offset, value);
    }

    Fixture {
        snapshot: s,
        int,
        int_ptr,
        char_ptr,
        void_ptr,
        point,
        vector,
        bare_vector,
        vector_alias,
        vector_ptr,
        derived,
        node,
        named,
        shape,
        circle,
        line,
    }
}

/// Counts memory reads going through the boundary
pub struct CountingTarget<'a> {
    pub inner: &'a Snapshot,
    pub reads: Cell<usize>,
}

impl<'a> CountingTarget<'a> {
    pub fn new(inner: &'a Snapshot) -> Self {
        Self {
            inner,
            reads: Cell::new(0),
        }
    }
}

impl Introspector for CountingTarget<'_> {
    fn describe(&self, ty: TypeId) -> Result<&TypeDescriptor, IntrospectError> {
        self.inner.describe(ty)
    }

    fn dynamic_type(&self, value: &ValueHandle) -> Result<TypeId, IntrospectError> {
        self.inner.dynamic_type(value)
    }

    fn read_scalar(&self, value: &ValueHandle) -> Result<Scalar, IntrospectError> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read_scalar(value)
    }

    fn read_c_string(
        &self,
        address: u64,
        char_size: u64,
        limit: usize,
    ) -> Result<String, IntrospectError> {
        self.reads.set(self.reads.get() + 1);
        self.inner.read_c_string(address, char_size, limit)
    }

    fn format_default(&self, value: &ValueHandle) -> Result<String, IntrospectError> {
        self.inner.format_default(value)
    }
}
