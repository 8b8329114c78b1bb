//! The export contract a reactor module must satisfy.
//!
//! A reactor guest exports:
//!
//! | Export          | Type            | Purpose                                  |
//! |-----------------|-----------------|------------------------------------------|
//! | `_initialize`   | `() -> ()`      | runtime initialization, called once      |
//! | `go_start_main` | `() -> ()`      | queues the program's main task           |
//! | `go_tick`       | `() -> i32`     | advances the guest scheduler one step    |
//! | `memory`        | memory          | linear memory shared with system calls   |
//!
//! [`validate`] checks a compiled [`Module`] against this table before any
//! instance exists, so a module that fails never reaches its initializer.

use wasmtime::{AsContextMut, ExternType, FuncType, Instance, Memory, Module, TypedFunc, ValType};

use crate::error::{ReactorError, Result};

pub const INITIALIZE: &str = "_initialize";
pub const START_MAIN: &str = "go_start_main";
pub const TICK: &str = "go_tick";
pub const MEMORY: &str = "memory";

const NOT_A_REACTOR: &str = "not a WASI reactor?";
const NOT_REACTOR_RUNTIME: &str = "not built with a reactor-capable runtime?";

/// Expected shape of a required function export.
struct FuncContract {
    name: &'static str,
    returns_i32: bool,
    hint: &'static str,
}

const FUNCTIONS: [FuncContract; 3] = [
    FuncContract {
        name: INITIALIZE,
        returns_i32: false,
        hint: NOT_A_REACTOR,
    },
    FuncContract {
        name: START_MAIN,
        returns_i32: false,
        hint: NOT_REACTOR_RUNTIME,
    },
    FuncContract {
        name: TICK,
        returns_i32: true,
        hint: NOT_REACTOR_RUNTIME,
    },
];

impl FuncContract {
    fn expected(&self) -> &'static str {
        if self.returns_i32 {
            "func() -> i32"
        } else {
            "func() -> ()"
        }
    }

    fn matches(&self, ty: &FuncType) -> bool {
        if ty.params().len() != 0 {
            return false;
        }
        let results: Vec<ValType> = ty.results().collect();
        match (self.returns_i32, results.as_slice()) {
            (false, []) => true,
            (true, [ValType::I32]) => true,
            _ => false,
        }
    }
}

fn describe(ty: &ExternType) -> String {
    match ty {
        ExternType::Func(f) => {
            let params: Vec<ValType> = f.params().collect();
            let results: Vec<ValType> = f.results().collect();
            format!("func{:?} -> {:?}", params, results)
        }
        ExternType::Global(_) => "global".to_string(),
        ExternType::Table(_) => "table".to_string(),
        ExternType::Memory(_) => "memory".to_string(),
        _ => "unknown".to_string(),
    }
}

/// Check that `module` exports everything a reactor needs.
///
/// The first missing or mistyped export is reported, in the order
/// `_initialize`, `go_start_main`, `go_tick`, `memory`.
pub fn validate(module: &Module) -> Result<()> {
    for contract in &FUNCTIONS {
        let ty = module
            .get_export(contract.name)
            .ok_or(ReactorError::MissingExport {
                name: contract.name,
                hint: contract.hint,
            })?;
        let ok = match &ty {
            ExternType::Func(f) => contract.matches(f),
            _ => false,
        };
        if !ok {
            return Err(ReactorError::ExportSignature {
                name: contract.name,
                expected: contract.expected(),
                found: describe(&ty),
            });
        }
    }

    match module.get_export(MEMORY) {
        None => Err(ReactorError::MissingExport {
            name: MEMORY,
            hint: NOT_A_REACTOR,
        }),
        Some(ExternType::Memory(_)) => Ok(()),
        Some(other) => Err(ReactorError::ExportSignature {
            name: MEMORY,
            expected: "memory",
            found: describe(&other),
        }),
    }
}

/// Typed handles to a validated instance's required exports.
pub struct GuestExports {
    pub initialize: TypedFunc<(), ()>,
    pub start_main: TypedFunc<(), ()>,
    pub tick: TypedFunc<(), i32>,
    pub memory: Memory,
}

impl GuestExports {
    /// Resolve the required exports of an instance of a validated module.
    pub fn resolve(mut store: impl AsContextMut, instance: &Instance) -> Result<Self> {
        let signature = |name: &'static str, expected: &'static str| {
            move |err: wasmtime::Error| ReactorError::ExportSignature {
                name,
                expected,
                found: format!("{:#}", err),
            }
        };

        let initialize = instance
            .get_typed_func::<(), ()>(&mut store, INITIALIZE)
            .map_err(signature(INITIALIZE, "func() -> ()"))?;
        let start_main = instance
            .get_typed_func::<(), ()>(&mut store, START_MAIN)
            .map_err(signature(START_MAIN, "func() -> ()"))?;
        let tick = instance
            .get_typed_func::<(), i32>(&mut store, TICK)
            .map_err(signature(TICK, "func() -> i32"))?;
        let memory = instance
            .get_memory(&mut store, MEMORY)
            .ok_or(ReactorError::MissingExport {
                name: MEMORY,
                hint: NOT_A_REACTOR,
            })?;

        Ok(Self {
            initialize,
            start_main,
            tick,
            memory,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasmtime::Engine;

    fn module(wat: &str) -> Module {
        Module::new(&Engine::default(), wat).unwrap()
    }

    const COMPLETE: &str = r#"
        (module
          (memory (export "memory") 1)
          (func (export "_initialize"))
          (func (export "go_start_main"))
          (func (export "go_tick") (result i32) i32.const -1))
    "#;

    #[test]
    fn accepts_complete_reactor() {
        validate(&module(COMPLETE)).unwrap();
    }

    #[test]
    fn missing_tick_is_named() {
        let err = validate(&module(
            r#"(module
                 (memory (export "memory") 1)
                 (func (export "_initialize"))
                 (func (export "go_start_main")))"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            ReactorError::MissingExport { name: "go_tick", .. }
        ));
        assert!(err.to_string().contains("go_tick"));
    }

    #[test]
    fn missing_initialize_hints_not_a_reactor() {
        let err = validate(&module(
            r#"(module
                 (memory (export "memory") 1)
                 (func (export "_start"))
                 (func (export "go_start_main"))
                 (func (export "go_tick") (result i32) i32.const 0))"#,
        ))
        .unwrap_err();
        match err {
            ReactorError::MissingExport { name, hint } => {
                assert_eq!(name, "_initialize");
                assert_eq!(hint, NOT_A_REACTOR);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_start_main_hints_wrong_runtime() {
        let err = validate(&module(
            r#"(module
                 (memory (export "memory") 1)
                 (func (export "_initialize"))
                 (func (export "go_tick") (result i32) i32.const 0))"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            ReactorError::MissingExport {
                name: "go_start_main",
                hint: NOT_REACTOR_RUNTIME
            }
        ));
    }

    #[test]
    fn missing_memory_is_named() {
        let err = validate(&module(
            r#"(module
                 (memory 1)
                 (func (export "_initialize"))
                 (func (export "go_start_main"))
                 (func (export "go_tick") (result i32) i32.const 0))"#,
        ))
        .unwrap_err();
        assert!(matches!(err, ReactorError::MissingExport { name: "memory", .. }));
    }

    #[test]
    fn tick_with_wrong_result_type_is_rejected() {
        let err = validate(&module(
            r#"(module
                 (memory (export "memory") 1)
                 (func (export "_initialize"))
                 (func (export "go_start_main"))
                 (func (export "go_tick") (result i64) i64.const 0))"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            ReactorError::ExportSignature { name: "go_tick", .. }
        ));
        assert!(err.is_contract_violation());
    }

    #[test]
    fn start_main_with_params_is_rejected() {
        let err = validate(&module(
            r#"(module
                 (memory (export "memory") 1)
                 (func (export "_initialize"))
                 (func (export "go_start_main") (param i32))
                 (func (export "go_tick") (result i32) i32.const 0))"#,
        ))
        .unwrap_err();
        assert!(matches!(
            err,
            ReactorError::ExportSignature {
                name: "go_start_main",
                ..
            }
        ));
    }

    #[test]
    fn memory_exported_as_global_is_rejected() {
        let err = validate(&module(
            r#"(module
                 (global (export "memory") i32 (i32.const 0))
                 (func (export "_initialize"))
                 (func (export "go_start_main"))
                 (func (export "go_tick") (result i32) i32.const 0))"#,
        ))
        .unwrap_err();
        match err {
            ReactorError::ExportSignature { name, found, .. } => {
                assert_eq!(name, "memory");
                assert_eq!(found, "global");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn resolve_returns_typed_handles() {
        let engine = Engine::default();
        let module = Module::new(&engine, COMPLETE).unwrap();
        let mut store = wasmtime::Store::new(&engine, ());
        let instance = Instance::new(&mut store, &module, &[]).unwrap();
        let exports = GuestExports::resolve(&mut store, &instance).unwrap();
        assert_eq!(exports.tick.call(&mut store, ()).unwrap(), -1);
        assert_eq!(exports.memory.data_size(&store), 65536);
    }
}
