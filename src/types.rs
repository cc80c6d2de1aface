//! Type system: int, char, pointer, array, function descriptors.
//!
//! Types are heap allocated (`Rc`) so the same descriptor can be shared
//! between an `Object` and every expression node that references it. `Type`
//! is immutable and carries no identity-bearing field, so a parameter's
//! type can be linked into both the function's `Func.params` and the
//! parameter object's own `ty` field by cloning the `Rc` — no deep or
//! shallow copy of the `Type` itself is ever needed.

use std::fmt;
use std::rc::Rc;

pub const INT_SIZE: usize = 8;
pub const CHAR_SIZE: usize = 1;
pub const PTR_SIZE: usize = 8;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Type {
    Int,
    Char,
    Ptr(Rc<Type>),
    Array { base: Rc<Type>, len: usize },
    Func {
        return_ty: Rc<Type>,
        params: Vec<Rc<Type>>,
    },
}

impl Type {
    pub fn size(&self) -> usize {
        match self {
            Type::Int => INT_SIZE,
            Type::Char => CHAR_SIZE,
            Type::Ptr(_) => PTR_SIZE,
            Type::Array { base, len } => base.size() * len,
            Type::Func { .. } => 0,
        }
    }

    pub fn is_integer(&self) -> bool {
        matches!(self, Type::Int | Type::Char)
    }

    /// The referent type for `PTR`/`ARRAY`; `None` for everything else.
    pub fn base(&self) -> Option<&Rc<Type>> {
        match self {
            Type::Ptr(b) => Some(b),
            Type::Array { base, .. } => Some(base),
            _ => None,
        }
    }

    pub fn pointer_to(base: Rc<Type>) -> Rc<Type> {
        Rc::new(Type::Ptr(base))
    }

    pub fn array_of(base: Rc<Type>, len: usize) -> Rc<Type> {
        Rc::new(Type::Array { base, len })
    }

    pub fn func_type(return_ty: Rc<Type>, params: Vec<Rc<Type>>) -> Rc<Type> {
        Rc::new(Type::Func { return_ty, params })
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Int => write!(f, "int"),
            Type::Char => write!(f, "char"),
            Type::Ptr(base) => write!(f, "{base}*"),
            Type::Array { base, len } => write!(f, "{base}[{len}]"),
            Type::Func { return_ty, params } => {
                let p: Vec<_> = params.iter().map(|t| t.to_string()).collect();
                write!(f, "{return_ty} ({})", p.join(", "))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_sizes() {
        assert_eq!(Type::Int.size(), 8);
        assert_eq!(Type::Char.size(), 1);
    }

    #[test]
    fn pointer_and_array_sizes() {
        let pi = Type::pointer_to(Rc::new(Type::Int));
        assert_eq!(pi.size(), PTR_SIZE);

        let arr = Type::array_of(Rc::new(Type::Int), 3);
        assert_eq!(arr.size(), 24);
    }

    #[test]
    fn is_integer_only_for_int_and_char() {
        assert!(Type::Int.is_integer());
        assert!(Type::Char.is_integer());
        assert!(!Type::pointer_to(Rc::new(Type::Int)).is_integer());
    }

    #[test]
    fn base_only_defined_for_ptr_and_array() {
        let pi = Type::pointer_to(Rc::new(Type::Int));
        assert_eq!(**pi.base().unwrap(), Type::Int);
        assert!(Type::Int.base().is_none());
    }

    #[test]
    fn func_type_has_zero_size_and_is_not_integer() {
        let f = Type::func_type(Rc::new(Type::Int), vec![Rc::new(Type::Int)]);
        assert_eq!(f.size(), 0);
        assert!(!f.is_integer());
    }
}
