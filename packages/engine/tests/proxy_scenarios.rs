// packages/engine/tests/proxy_scenarios.rs
//! End-to-end proxy scenarios

use parking_lot::Mutex;
use proxy_engine::factory::FailureKind;
use proxy_engine::{
    args, handler_fn, Contract, Delegate, FailurePolicy, InvocationError, InvocationHandler,
    Operation, OperationCatalog, ProxyConfig, ProxyFactory, ProxyInstance, Signature, Skeleton,
    TypeRef, Value,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

fn greeter() -> Arc<Contract> {
    Contract::pure("app.Greeter")
        .operation(Operation::new("greet").param(TypeRef::Str).returns(TypeRef::Str))
        .build()
        .unwrap()
}

/// Typed facade over a proxy of `app.Greeter`
trait Greeter {
    fn greet(&self, name: &str) -> Result<String, InvocationError>;
}

impl Greeter for ProxyInstance {
    fn greet(&self, name: &str) -> Result<String, InvocationError> {
        self.call_as("greet", &args![name])
    }
}

fn failing() -> Arc<dyn InvocationHandler> {
    handler_fn(|_, op, _| anyhow::bail!("handler refused {}", op.name()))
}

#[test]
fn test_greeter_says_hello() {
    let handler = handler_fn(|_, _, args| {
        let name = args[0].as_str().unwrap_or_default();
        Ok(Value::Str(format!("Hello, {}", name)))
    });

    let proxy = proxy_engine::new_proxy_instance(&greeter(), handler).unwrap();
    assert_eq!(proxy.greet("Ada").unwrap(), "Hello, Ada");
    assert_eq!(proxy.type_name(), "Proxy$Greeter");
    assert!(proxy.skeleton().is_none());
}

#[test]
fn test_greeter_failure_swallowed_to_empty_string() {
    let factory = ProxyFactory::new(ProxyConfig::swallowing());
    let proxy = factory.new_proxy_instance(&greeter(), failing()).unwrap();

    assert_eq!(proxy.greet("Ada").unwrap(), "");

    let failures = proxy.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].signature, "greet(str)");
    assert_eq!(failures[0].kind, FailureKind::NotImplemented);
}

#[test]
fn test_greeter_failure_propagated_by_default() {
    let proxy = proxy_engine::new_proxy_instance(&greeter(), failing()).unwrap();

    let err = proxy.greet("Ada").unwrap_err();
    assert!(matches!(err, InvocationError::NotImplemented { .. }));
    assert_eq!(proxy.failures().len(), 1);
}

#[test]
fn test_fixed_result_and_recorded_calls() {
    let contract = Contract::pure("app.Probe")
        .operation(Operation::new("a").returns(TypeRef::I32))
        .operation(Operation::new("b").param(TypeRef::I32))
        .build()
        .unwrap();

    let calls = Arc::new(Mutex::new(Vec::new()));
    let recorded = Arc::clone(&calls);
    let handler = handler_fn(move |_, op, args| match op.name() {
        "a" => Ok(Value::Int(42)),
        _ => {
            recorded.lock().push(args.to_vec());
            Ok(Value::Unit)
        }
    });

    let proxy = proxy_engine::new_proxy_instance(&contract, handler).unwrap();
    assert_eq!(proxy.call_as::<i32>("a", &[]).unwrap(), 42);
    assert_eq!(proxy.call_as::<i32>("a", &[]).unwrap(), 42);

    proxy.call("b", &args![7]).unwrap();
    assert_eq!(*calls.lock(), vec![vec![Value::Int(7)]]);

    proxy.call("b", &args![-3]).unwrap();
    assert_eq!(calls.lock().len(), 2);
    assert_eq!(calls.lock()[1], vec![Value::Int(-3)]);
}

#[test]
fn test_receiver_only_for_operations_with_body() {
    let contract = Contract::concrete("app.Document")
        .operation(Operation::new("render").returns(TypeRef::Str))
        .operation(
            Operation::new("title")
                .returns(TypeRef::Str)
                .body(|_, _| Ok(Value::Str("untitled".to_string()))),
        )
        .build()
        .unwrap();

    let receivers = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&receivers);
    let handler = handler_fn(move |receiver: Option<&Skeleton>, op, _| {
        seen.lock().push((op.name().to_string(), receiver.is_some()));
        Ok(Value::Str(op.name().to_string()))
    });

    let proxy = proxy_engine::new_proxy_instance(&contract, handler).unwrap();
    proxy.call("render", &[]).unwrap();
    proxy.call("title", &[]).unwrap();

    assert_eq!(
        *receivers.lock(),
        vec![("render".to_string(), false), ("title".to_string(), true)]
    );
}

#[test]
fn test_delegate_reaches_real_body() {
    let contract = Contract::concrete("app.Document")
        .operation(
            Operation::new("title")
                .returns(TypeRef::Str)
                .body(|_, _| Ok(Value::Str("untitled".to_string()))),
        )
        .build()
        .unwrap();

    let proxy = proxy_engine::new_proxy_instance(&contract, Arc::new(Delegate)).unwrap();
    assert_eq!(proxy.call_as::<String>("title", &[]).unwrap(), "untitled");
}

#[test]
fn test_swallowed_failures_yield_defaults() {
    let contract = Contract::pure("app.Everything")
        .operation(Operation::new("count").returns(TypeRef::I64))
        .operation(Operation::new("ratio").returns(TypeRef::F64))
        .operation(Operation::new("ready").returns(TypeRef::Bool))
        .operation(Operation::new("label").returns(TypeRef::Str))
        .operation(Operation::new("owner").returns(TypeRef::object("app.User")))
        .operation(Operation::new("nickname").returns(TypeRef::optional(TypeRef::Str)))
        .operation(Operation::new("tags").returns(TypeRef::list(TypeRef::Str)))
        .operation(Operation::new("flush"))
        .build()
        .unwrap();

    let factory = ProxyFactory::new(ProxyConfig::swallowing());
    let proxy = factory.new_proxy_instance(&contract, failing()).unwrap();

    assert_eq!(proxy.call("count", &[]).unwrap(), Value::Int(0));
    assert_eq!(proxy.call("ratio", &[]).unwrap(), Value::Float(0.0));
    assert_eq!(proxy.call("ready", &[]).unwrap(), Value::Bool(false));
    assert_eq!(proxy.call("label", &[]).unwrap(), Value::Str(String::new()));
    assert_eq!(proxy.call("owner", &[]).unwrap(), Value::Null);
    assert_eq!(proxy.call("nickname", &[]).unwrap(), Value::Null);
    assert_eq!(proxy.call("tags", &[]).unwrap(), Value::List(Vec::new()));
    assert_eq!(proxy.call("flush", &[]).unwrap(), Value::Unit);

    assert_eq!(proxy.failures().len(), 8);
    assert_eq!(proxy.policy(), FailurePolicy::Swallow);
}

#[test]
fn test_bad_handler_result_is_a_failure() {
    let contract = Contract::pure("app.Sized")
        .operation(Operation::new("size").returns(TypeRef::I32))
        .build()
        .unwrap();
    let handler = handler_fn(|_, _, _| Ok(Value::Str("big".to_string())));

    let strict = proxy_engine::new_proxy_instance(&contract, Arc::clone(&handler)).unwrap();
    let err = strict.call("size", &[]).unwrap_err();
    assert!(matches!(err, InvocationError::ReturnType { .. }));

    let lenient = ProxyFactory::new(ProxyConfig::swallowing())
        .new_proxy_instance(&contract, handler)
        .unwrap();
    assert_eq!(lenient.call("size", &[]).unwrap(), Value::Int(0));
    assert_eq!(lenient.failures()[0].kind, FailureKind::ReturnType);
}

#[test]
fn test_argument_errors_always_propagate() {
    let factory = ProxyFactory::new(ProxyConfig::swallowing());
    let proxy = factory
        .new_proxy_instance(&greeter(), handler_fn(|_, _, _| Ok(Value::Str(String::new()))))
        .unwrap();

    let err = proxy.call("greet", &args![1]).unwrap_err();
    assert!(matches!(err, InvocationError::Arguments { .. }));
    let err = proxy.call("greet", &[]).unwrap_err();
    assert!(matches!(err, InvocationError::Arguments { .. }));
    assert!(proxy.failures().is_empty());
}

#[test]
fn test_excluded_operations_bypass_handler() {
    let contract = Contract::concrete("app.Account")
        .operation(Operation::new("balance").returns(TypeRef::I64))
        .operation(
            Operation::new("id")
                .returns(TypeRef::I64)
                .final_()
                .body(|_, _| Ok(Value::Int(17))),
        )
        .operation(
            Operation::new("bank")
                .returns(TypeRef::Str)
                .static_()
                .body(|_, _| Ok(Value::Str("ACME".to_string()))),
        )
        .operation(
            Operation::new("checksum")
                .param(TypeRef::I64)
                .returns(TypeRef::I64)
                .native(|_, args| Ok(Value::Int(args[0].as_int().unwrap_or(0) * 31))),
        )
        .build()
        .unwrap();

    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let handler = handler_fn(move |_, _, _| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Int(100))
    });

    let proxy = proxy_engine::new_proxy_instance(&contract, handler).unwrap();

    assert!(proxy.is_forwarded(&Signature::new("balance", [])));
    assert!(!proxy.is_forwarded(&Signature::new("id", [])));
    assert!(!proxy.is_forwarded(&Signature::new("bank", [])));
    assert!(!proxy.is_forwarded(&Signature::new("checksum", [TypeRef::I64])));

    assert_eq!(proxy.call_as::<i64>("id", &[]).unwrap(), 17);
    assert_eq!(proxy.call_as::<String>("bank", &[]).unwrap(), "ACME");
    assert_eq!(proxy.call_as::<i64>("checksum", &args![2i64]).unwrap(), 62);
    assert_eq!(hits.load(Ordering::SeqCst), 0);

    assert_eq!(proxy.call_as::<i64>("balance", &[]).unwrap(), 100);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[test]
fn test_catalog_is_set_like_across_hierarchy() {
    let closeable = Contract::pure("io.Closeable")
        .operation(Operation::new("close"))
        .build()
        .unwrap();
    let base = Contract::concrete("io.Stream")
        .implements(Arc::clone(&closeable))
        .operation(Operation::new("read").returns(TypeRef::Bytes))
        .operation(Operation::new("close").body(|_, _| Ok(Value::Unit)))
        .build()
        .unwrap();
    let file = Contract::concrete("io.File")
        .extends(base)
        .implements(closeable)
        .operation(Operation::new("close").body(|_, _| Ok(Value::Unit)))
        .operation(
            Operation::new("path")
                .returns(TypeRef::Str)
                .body(|_, _| Ok(Value::Str("/tmp".to_string()))),
        )
        .build()
        .unwrap();

    let first: BTreeSet<String> = OperationCatalog::enumerate(&file)
        .unwrap()
        .signatures()
        .map(ToString::to_string)
        .collect();
    let second: BTreeSet<String> = OperationCatalog::enumerate(&file)
        .unwrap()
        .signatures()
        .map(ToString::to_string)
        .collect();

    assert_eq!(first, second);
    let expected: BTreeSet<String> = ["close()", "path()", "read()"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    assert_eq!(first, expected);
}

#[test]
fn test_concurrent_calls_on_one_proxy() {
    let contract = Contract::pure("app.Adder")
        .operation(
            Operation::new("add")
                .param(TypeRef::I64)
                .param(TypeRef::I64)
                .returns(TypeRef::I64),
        )
        .build()
        .unwrap();
    let handler = handler_fn(|_, _, args| {
        let sum = args.iter().filter_map(Value::as_int).sum::<i64>();
        Ok(Value::Int(sum))
    });

    let proxy = proxy_engine::new_proxy_instance(&contract, handler).unwrap();
    let handles: Vec<_> = (0..8i64)
        .map(|n| {
            let proxy = proxy.clone();
            thread::spawn(move || proxy.call_as::<i64>("add", &args![n, 1i64]).unwrap())
        })
        .collect();

    let mut results: Vec<i64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    results.sort_unstable();
    assert_eq!(results, (1..=8).collect::<Vec<i64>>());
}

#[test]
fn test_cached_factory_shared_across_threads() {
    let config = ProxyConfig {
        cache_types: true,
        ..ProxyConfig::default()
    };
    let factory = Arc::new(ProxyFactory::new(config));
    let contract = greeter();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let factory = Arc::clone(&factory);
            let contract = Arc::clone(&contract);
            thread::spawn(move || {
                let handler = handler_fn(|_, _, _| Ok(Value::Str("hi".to_string())));
                factory.new_proxy_instance(&contract, handler).unwrap()
            })
        })
        .collect();

    let proxies: Vec<ProxyInstance> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(proxies
        .iter()
        .all(|p| Arc::ptr_eq(p.built_type(), proxies[0].built_type())));
    assert!(proxies.iter().all(|p| p.greet("x").unwrap() == "hi"));
}

#[test]
fn test_final_operation_never_reaches_handler() {
    let base = Contract::concrete("app.Base")
        .operation(
            Operation::new("id")
                .returns(TypeRef::I64)
                .final_()
                .body(|_, _| Ok(Value::Int(17))),
        )
        .operation(Operation::new("label").returns(TypeRef::Str))
        .build()
        .unwrap();

    let redeclared = Contract::concrete("app.Derived")
        .extends(Arc::clone(&base))
        .operation(
            Operation::new("id")
                .returns(TypeRef::I64)
                .body(|_, _| Ok(Value::Int(100))),
        )
        .build();
    let err = redeclared.err().unwrap();
    assert!(err.to_string().contains("cannot override final operation"));

    let derived = Contract::concrete("app.Derived").extends(base).build().unwrap();
    let hits = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&hits);
    let proxy = ProxyFactory::default()
        .new_proxy_instance(
            &derived,
            handler_fn(move |_, _, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Str("proxied".to_string()))
            }),
        )
        .unwrap();

    assert!(!proxy.is_forwarded(&Signature::new("id", [])));
    assert_eq!(proxy.call_as::<i64>("id", &[]).unwrap(), 17);
    assert_eq!(hits.load(Ordering::SeqCst), 0);
    assert_eq!(proxy.call_as::<String>("label", &[]).unwrap(), "proxied");
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}
