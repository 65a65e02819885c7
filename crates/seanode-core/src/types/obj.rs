//! Struct and array object shapes
//!
//! A struct is a field map plus an above-center flag. Fields a high struct
//! does not list are `ANY`; fields a low struct does not list are `ALL`. With
//! that reading the meet is simply pointwise, and default-valued fields are
//! never stored.

use super::Ty;
use smallvec::SmallVec;
use std::cmp::Ordering;

/// Name of the closure display field; always sorts first.
pub const DISPLAY_FIELD: &str = "^";

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    pub name: String,
    pub ty: Ty,
}

impl Field {
    pub fn new(name: impl Into<String>, ty: Ty) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Canonical field order: the display first, then alphabetical.
pub fn field_order(a: &str, b: &str) -> Ordering {
    (a != DISPLAY_FIELD, a).cmp(&(b != DISPLAY_FIELD, b))
}

pub type Fields = SmallVec<[Field; 4]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct StructType {
    any: bool,
    flds: Fields,
}

impl StructType {
    pub fn new(any: bool) -> Self {
        Self {
            any,
            flds: Fields::new(),
        }
    }

    pub(crate) fn from_parts(any: bool, flds: Fields) -> Self {
        Self { any, flds }
    }

    pub(crate) fn into_fields(self) -> Fields {
        self.flds
    }

    pub fn any(&self) -> bool {
        self.any
    }

    pub fn fields(&self) -> &[Field] {
        &self.flds
    }

    fn position(&self, name: &str) -> std::result::Result<usize, usize> {
        self.flds
            .binary_search_by(|f| field_order(&f.name, name))
    }

    pub fn find(&self, name: &str) -> Option<Ty> {
        self.position(name).ok().map(|i| self.flds[i].ty)
    }

    /// Value of `name`, counting unlisted fields as the default.
    pub fn get(&self, name: &str) -> Ty {
        self.find(name).unwrap_or(self.default_ty())
    }

    pub(crate) fn default_ty(&self) -> Ty {
        if self.any {
            Ty::ANY
        } else {
            Ty::ALL
        }
    }

    /// Insert or overwrite a field, keeping canonical order.
    pub fn add(&mut self, name: impl Into<String>, ty: Ty) {
        let name = name.into();
        match self.position(&name) {
            Ok(i) => self.flds[i].ty = ty,
            Err(i) => self.flds.insert(i, Field { name, ty }),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<Ty> {
        let i = self.position(name).ok()?;
        Some(self.flds.remove(i).ty)
    }

    /// Remove the last field in canonical order.
    pub fn pop(&mut self) -> Option<Field> {
        self.flds.pop()
    }

    pub(crate) fn canonicalize(&mut self) {
        self.flds.sort_by(|a, b| field_order(&a.name, &b.name));
        self.flds.dedup_by(|later, earlier| later.name == earlier.name);
        let dflt = self.default_ty();
        self.flds.retain(|f| f.ty != dflt);
    }
}

/// Arrays track length, element and storage separately; loads ignore the
/// index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AryType {
    pub len: Ty,
    pub elem: Ty,
    pub stor: Ty,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_field_sorts_first() {
        assert_eq!(field_order("^", "a"), Ordering::Less);
        assert_eq!(field_order("A", "^"), Ordering::Greater);
        assert_eq!(field_order("x", "y"), Ordering::Less);
    }

    #[test]
    fn test_add_keeps_order() {
        let mut st = StructType::new(false);
        st.add("y", Ty::SCALAR);
        st.add("x", Ty::CTRL);
        st.add(DISPLAY_FIELD, Ty::XSCALAR);
        let names: Vec<_> = st.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["^", "x", "y"]);
        st.add("x", Ty::SCALAR);
        assert_eq!(st.find("x"), Some(Ty::SCALAR));
        assert_eq!(st.fields().len(), 3);
    }

    #[test]
    fn test_remove_and_pop() {
        let mut st = StructType::new(true);
        st.add("a", Ty::SCALAR);
        st.add("b", Ty::SCALAR);
        assert_eq!(st.remove("a"), Some(Ty::SCALAR));
        assert_eq!(st.remove("a"), None);
        assert_eq!(st.pop().map(|f| f.name), Some("b".to_string()));
        assert!(st.pop().is_none());
    }

    #[test]
    fn test_missing_field_defaults() {
        let hi = StructType::new(true);
        let lo = StructType::new(false);
        assert_eq!(hi.get("x"), Ty::ANY);
        assert_eq!(lo.get("x"), Ty::ALL);
    }

    #[test]
    fn test_canonicalize_drops_defaults() {
        let mut st = StructType::from_parts(
            false,
            [Field::new("b", Ty::ALL), Field::new("a", Ty::SCALAR)]
                .into_iter()
                .collect(),
        );
        st.canonicalize();
        assert_eq!(st.fields(), &[Field::new("a", Ty::SCALAR)]);
    }
}
