/// Declare a runtime ABI binding table
///
/// Every entry becomes an `Option` of a function pointer named after the
/// runtime's exported C symbol minus its prefix. `load` fills each slot by
/// looking up `prefix + name`; a symbol that does not resolve leaves its
/// slot `None`.
///
/// ```ignore
/// runtime_api! {
///     /// IL2CPP exports
///     pub struct Il2CppApi("il2cpp_", "C") {
///         fn init(domain_name: *const c_char) -> i32;
///     }
/// }
/// ```
macro_rules! runtime_api {
    (
        $(#[$meta:meta])*
        pub struct $name:ident($prefix:literal, $abi:tt) {
            $(
                $(#[$fmeta:meta])*
                fn $field:ident($($arg:ident: $ty:ty),* $(,)?) $(-> $ret:ty)?;
            )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Default)]
        pub struct $name {
            $(
                $(#[$fmeta])*
                pub $field: Option<unsafe extern $abi fn($($arg: $ty),*) $(-> $ret)?>,
            )*
        }

        impl $name {
            /// Symbol prefix shared by every entry of this table
            pub const PREFIX: &'static str = $prefix;

            /// Bind every slot from `source`
            pub fn load(source: &dyn $crate::backend::SymbolSource) -> Self {
                let table = $name {
                    $(
                        $field: source
                            .resolve(concat!($prefix, stringify!($field)))
                            .map(|address| unsafe { $crate::backend::cast_symbol(address) }),
                    )*
                };
                log::debug!(
                    "{}: bound {} of {} symbols",
                    stringify!($name),
                    table.bound_count(),
                    Self::SYMBOLS.len()
                );
                table
            }

            /// Exported names of every slot, in declaration order
            pub const SYMBOLS: &'static [&'static str] = &[
                $(concat!($prefix, stringify!($field)),)*
            ];

            /// Number of slots that resolved
            pub fn bound_count(&self) -> usize {
                [$(self.$field.is_some(),)*].iter().filter(|bound| **bound).count()
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_struct(stringify!($name))
                    $(.field(stringify!($field), &self.$field.is_some()))*
                    .finish()
            }
        }
    };
}
