//! Type → translator depot
//!
//! The depot canonicalizes a descriptor, returns the cached translator when
//! there is one and otherwise asks its factories in order. Construction
//! runs without holding any lock: two threads racing on the same type may
//! both build it, the first install wins and the other result is dropped.
//!
//! A type that refers to itself, directly or through arrays, nullables,
//! record fields or interface signatures, is resolved through a forward translator while it is
//! still being built on the current thread.

use crate::error::{MarshalError, Result};
use crate::translator::{
    ArrayFactory, ForwardSlot, InterfaceFactory, LeafFactory, NullableFactory, RecordFactory,
    Translator, TranslatorFactory,
};
use crate::types::TypeDescriptor;
use crate::value::HostType;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::thread::{self, ThreadId};
use tether_metrics::Counter;

/// Child programs up to this many bytes are copied into their parent.
pub const DEFAULT_INLINE_LIMIT: usize = 8 * 1024;

/// Depot configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DepotSettings {
    /// Largest child program, in bytes, that is inlined rather than invoked.
    pub inline_limit: usize,
}

impl Default for DepotSettings {
    fn default() -> Self {
        Self {
            inline_limit: DEFAULT_INLINE_LIMIT,
        }
    }
}

impl DepotSettings {
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

pub struct DepotBuilder {
    settings: DepotSettings,
    factories: Vec<Box<dyn TranslatorFactory>>,
}

impl DepotBuilder {
    pub fn new() -> Self {
        Self {
            settings: DepotSettings::default(),
            factories: Vec::new(),
        }
    }

    pub fn settings(mut self, settings: DepotSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn inline_limit(mut self, inline_limit: usize) -> Self {
        self.settings.inline_limit = inline_limit;
        self
    }

    /// Register a factory, consulted after the built-in ones in
    /// registration order.
    pub fn factory(mut self, factory: impl TranslatorFactory + 'static) -> Self {
        self.factories.push(Box::new(factory));
        self
    }

    pub fn build(self) -> Depot {
        let mut factories: Vec<Box<dyn TranslatorFactory>> = vec![
            Box::new(LeafFactory),
            Box::new(ArrayFactory),
            Box::new(NullableFactory),
            Box::new(RecordFactory),
            Box::new(InterfaceFactory),
        ];
        factories.extend(self.factories);

        Depot {
            settings: self.settings,
            cache: DashMap::new(),
            in_flight: DashMap::new(),
            factories,
            counters: Counter::new(),
        }
    }
}

impl Default for DepotBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Memoizing type → translator resolver, shared across threads.
pub struct Depot {
    settings: DepotSettings,
    cache: DashMap<TypeDescriptor, Arc<Translator>>,
    in_flight: DashMap<(ThreadId, TypeDescriptor), Arc<ForwardSlot>>,
    factories: Vec<Box<dyn TranslatorFactory>>,
    counters: Counter,
}

impl Depot {
    pub fn new() -> Self {
        DepotBuilder::new().build()
    }

    pub fn builder() -> DepotBuilder {
        DepotBuilder::new()
    }

    pub fn with_settings(settings: DepotSettings) -> Self {
        DepotBuilder::new().settings(settings).build()
    }

    pub fn settings(&self) -> &DepotSettings {
        &self.settings
    }

    pub fn inline_limit(&self) -> usize {
        self.settings.inline_limit
    }

    /// Marshalling event counters (`depot.*`, `engine.*`).
    pub fn counters(&self) -> &Counter {
        &self.counters
    }

    /// Number of cached translators.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// The translator for `descriptor`, building and caching it on first
    /// use. Equal canonical descriptors always yield the same instance.
    pub fn resolve(&self, descriptor: &TypeDescriptor) -> Result<Arc<Translator>> {
        let descriptor = descriptor.canonicalize();
        if let Some(cached) = self.cache.get(&descriptor) {
            self.counters.increment("depot.cache_hit", 1);
            tracing::trace!(ty = %descriptor, "translator cache hit");
            return Ok(Arc::clone(cached.value()));
        }

        let key = (thread::current().id(), descriptor);
        let pending = self.in_flight.get(&key).map(|slot| Arc::clone(slot.value()));
        if let Some(slot) = pending {
            self.counters.increment("depot.forward_ref", 1);
            tracing::debug!(ty = %key.1, "type refers to itself, emitting forward reference");
            return slot.translator().map(Arc::new);
        }

        let slot = ForwardSlot::new(key.1.clone());
        self.in_flight.insert(key.clone(), Arc::clone(&slot));
        let built = self.build(&key.1);
        self.in_flight.remove(&key);
        let (_, descriptor) = key;

        let installed = match self.cache.entry(descriptor) {
            Entry::Occupied(entry) => {
                self.counters.increment("depot.discarded", 1);
                tracing::trace!(ty = %entry.key(), "lost install race, discarding duplicate");
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => Arc::clone(entry.insert(built?).value()),
        };
        slot.fill(&installed);
        Ok(installed)
    }

    /// [`Depot::resolve`] for a Rust type's descriptor.
    pub fn resolve_for<T: HostType>(&self) -> Result<Arc<Translator>> {
        self.resolve(&T::descriptor())
    }

    fn build(&self, descriptor: &TypeDescriptor) -> Result<Arc<Translator>> {
        for factory in &self.factories {
            if let Some(translator) = factory.create(self, descriptor)? {
                self.counters.increment("depot.build", 1);
                tracing::debug!(
                    ty = %descriptor,
                    pickle_len = translator.pickle_program().len(),
                    unpickle_len = translator.unpickle_program().len(),
                    placeholders = translator.placeholders().len(),
                    "built translator"
                );
                return Ok(translator);
            }
        }
        Err(MarshalError::NoTranslator(descriptor.clone()))
    }
}

impl Default for Depot {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Depot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Depot")
            .field("settings", &self.settings)
            .field("cached", &self.cache.len())
            .field("factories", &self.factories.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::program::opcode::{pickle, unpickle};
    use crate::value::HostValue;
    use rayon::prelude::*;

    fn point() -> TypeDescriptor {
        TypeDescriptor::record("Point")
            .field("x", TypeDescriptor::Int)
            .field("y", TypeDescriptor::Int)
            .build()
    }

    fn node() -> TypeDescriptor {
        TypeDescriptor::record("Node")
            .field("value", TypeDescriptor::Int)
            .field(
                "next",
                TypeDescriptor::nullable_of(TypeDescriptor::named("Node", Vec::new())),
            )
            .build()
    }

    /// Resolves `Node` to the self-referential record above.
    struct NodeFactory;

    impl TranslatorFactory for NodeFactory {
        fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
            match descriptor {
                TypeDescriptor::Named { name, args } if name == "Node" && args.is_empty() => {
                    depot.resolve(&node()).map(Some)
                }
                _ => Ok(None),
            }
        }
    }

    /// Aliases `Pair<A, B>` to a record with `first` and `second` fields.
    struct PairFactory;

    impl TranslatorFactory for PairFactory {
        fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
            let TypeDescriptor::Named { name, args } = descriptor else {
                return Ok(None);
            };
            if name != "Pair" || args.len() != 2 {
                return Ok(None);
            }
            let record = TypeDescriptor::record("Pair")
                .field("first", args[0].clone())
                .field("second", args[1].clone())
                .build();
            depot.resolve(&record).map(Some)
        }
    }

    #[test]
    fn test_cache_identity() {
        let depot = Depot::new();
        let a = depot.resolve(&TypeDescriptor::array_of(TypeDescriptor::String)).unwrap();
        let b = depot.resolve(&TypeDescriptor::array_of(TypeDescriptor::String)).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        // String and String[]
        assert_eq!(depot.len(), 2);
    }

    #[test]
    fn test_concurrent_first_resolution() {
        let depot = Depot::new();
        let ty = TypeDescriptor::array_of(TypeDescriptor::nullable_of(point()));
        let resolved: Vec<_> = (0..64)
            .into_par_iter()
            .map(|_| depot.resolve(&ty).unwrap())
            .collect();
        assert!(resolved.iter().all(|t| Arc::ptr_eq(t, &resolved[0])));
        assert!(Arc::ptr_eq(&resolved[0], &depot.resolve(&ty).unwrap()));
    }

    #[test]
    fn test_canonical_forms_share_translators() {
        let depot = Depot::new();
        let single = depot.resolve(&TypeDescriptor::nullable_of(TypeDescriptor::String)).unwrap();
        let double = depot
            .resolve(&TypeDescriptor::nullable_of(TypeDescriptor::nullable_of(
                TypeDescriptor::String,
            )))
            .unwrap();
        assert!(Arc::ptr_eq(&single, &double));

        let void = depot.resolve(&TypeDescriptor::Void).unwrap();
        let nullable_void = depot.resolve(&TypeDescriptor::nullable_of(TypeDescriptor::Void)).unwrap();
        assert!(Arc::ptr_eq(&void, &nullable_void));

        let bounded = depot
            .resolve(&TypeDescriptor::array_of(TypeDescriptor::wildcard_of(TypeDescriptor::Int)))
            .unwrap();
        assert_eq!(bounded.descriptor(), &TypeDescriptor::array_of(TypeDescriptor::Int));
    }

    #[test]
    fn test_placeholder_rebased_through_inlined_parent() {
        // Point (23 bytes) is invoked, Point[] (10 bytes) is inlined
        let depot = Depot::builder().inline_limit(10).build();
        let ty = TypeDescriptor::nullable_of(TypeDescriptor::array_of(point()));
        let translator = depot.resolve(&ty).unwrap();

        let array = depot.resolve(&TypeDescriptor::array_of(point())).unwrap();
        assert_eq!(array.placeholders()[0].pickle_offset, 5);

        let placeholder = &translator.placeholders()[0];
        assert_eq!(placeholder.descriptor, point());
        assert_eq!(placeholder.pickle_offset, 10);
        assert_eq!(placeholder.unpickle_offset, 10);
        assert_eq!(translator.pickle_program()[10], pickle::TYPE_COMMAND);
        assert_eq!(translator.unpickle_program()[10], unpickle::TYPE_COMMAND);
    }

    #[test]
    fn test_inline_and_invoke_agree_on_host_bytes() {
        let ty = TypeDescriptor::array_of(TypeDescriptor::nullable_of(point()));
        let value = HostValue::Array {
            element: TypeDescriptor::nullable_of(point()),
            items: vec![
                HostValue::Null,
                HostValue::Record {
                    name: "Point".into(),
                    fields: vec![("x".into(), HostValue::Int(3)), ("y".into(), HostValue::Int(4))],
                },
            ],
        };

        let inline = Depot::new().resolve(&ty).unwrap();
        let invoke = Depot::builder().inline_limit(0).build().resolve(&ty).unwrap();
        assert!(inline.placeholders().is_empty());
        assert_eq!(invoke.placeholders().len(), 1);

        let bytes = inline.pickle_value(&value).unwrap();
        assert_eq!(invoke.pickle_value(&value).unwrap(), bytes);
        assert_eq!(invoke.unpickle_bytes(&bytes).unwrap(), value);
    }

    #[test]
    fn test_unknown_type() {
        let depot = Depot::new();
        let ty = TypeDescriptor::named("Pair", vec![TypeDescriptor::Int, TypeDescriptor::String]);
        let err = depot.resolve(&ty).unwrap_err();
        assert_eq!(err, MarshalError::NoTranslator(ty));
        assert_eq!(err.to_string(), "no translator found for Pair<int, String>");
        assert!(depot.resolve(&TypeDescriptor::array_of(TypeDescriptor::named("Pair", Vec::new()))).is_err());
    }

    #[test]
    fn test_user_factory() {
        let depot = Depot::builder().factory(PairFactory).build();
        let ty = TypeDescriptor::named("Pair", vec![TypeDescriptor::Int, TypeDescriptor::String]);
        let translator = depot.resolve(&ty).unwrap();
        assert!(Arc::ptr_eq(&translator, &depot.resolve(&ty).unwrap()));

        let value = HostValue::Record {
            name: "Pair".into(),
            fields: vec![
                ("first".into(), HostValue::Int(1)),
                ("second".into(), HostValue::String("one".into())),
            ],
        };
        let bytes = translator.pickle_value(&value).unwrap();
        assert_eq!(translator.unpickle_bytes(&bytes).unwrap(), value);
    }

    #[test]
    fn test_self_referential_record() {
        let depot = Depot::builder().factory(NodeFactory).build();
        let translator = depot.resolve(&node()).unwrap();

        // The nested reference is a command back into the depot
        let placeholder = &translator.placeholders()[0];
        assert_eq!(placeholder.descriptor, node());

        let list = |value: i32, next: HostValue| HostValue::Record {
            name: "Node".into(),
            fields: vec![("value".into(), HostValue::Int(value)), ("next".into(), next)],
        };
        let value = list(1, list(2, list(3, HostValue::Null)));
        let bytes = translator.pickle_value(&value).unwrap();
        assert_eq!(translator.unpickle_bytes(&bytes).unwrap(), value);
    }

    #[test]
    fn test_settings_from_json() {
        let settings = DepotSettings::from_json(r#"{ "inline_limit": 0 }"#).unwrap();
        assert_eq!(Depot::with_settings(settings).inline_limit(), 0);

        let settings = DepotSettings::from_json("{}").unwrap();
        assert_eq!(settings.inline_limit, DEFAULT_INLINE_LIMIT);
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_counters() {
        let depot = Depot::new();
        depot.resolve(&TypeDescriptor::array_of(TypeDescriptor::Int)).unwrap();
        depot.resolve(&TypeDescriptor::array_of(TypeDescriptor::Int)).unwrap();
        assert_eq!(depot.counters().get("depot.build"), 2);
        assert_eq!(depot.counters().get("depot.cache_hit"), 1);
    }

    /// Builds `Slow` only once two threads are inside `create` together.
    #[cfg(feature = "metrics")]
    struct RendezvousFactory {
        barrier: std::sync::Barrier,
        builds: Arc<std::sync::atomic::AtomicUsize>,
    }

    #[cfg(feature = "metrics")]
    impl TranslatorFactory for RendezvousFactory {
        fn create(&self, depot: &Depot, descriptor: &TypeDescriptor) -> Result<Option<Arc<Translator>>> {
            if !matches!(descriptor, TypeDescriptor::Named { name, .. } if name == "Slow") {
                return Ok(None);
            }
            self.barrier.wait();
            self.builds.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            let element = crate::translator::leaf_translator(&TypeDescriptor::Int)
                .ok_or_else(|| MarshalError::NoTranslator(TypeDescriptor::Int))?;
            crate::translator::array_translator(element, depot.inline_limit())
                .map(|translator| Some(Arc::new(translator)))
        }
    }

    #[cfg(feature = "metrics")]
    #[test]
    fn test_losing_build_is_discarded() {
        let builds = Arc::new(std::sync::atomic::AtomicUsize::new(0));
        let depot = Depot::builder()
            .factory(RendezvousFactory {
                barrier: std::sync::Barrier::new(2),
                builds: Arc::clone(&builds),
            })
            .build();
        let ty = TypeDescriptor::named("Slow", Vec::new());

        let (a, b) = std::thread::scope(|scope| {
            let a = scope.spawn(|| depot.resolve(&ty).unwrap());
            let b = scope.spawn(|| depot.resolve(&ty).unwrap());
            (a.join().unwrap(), b.join().unwrap())
        });

        assert_eq!(builds.load(std::sync::atomic::Ordering::SeqCst), 2);
        assert!(Arc::ptr_eq(&a, &b));
        assert!(Arc::ptr_eq(&a, &depot.resolve(&ty).unwrap()));
        assert_eq!(depot.counters().get("depot.build"), 2);
        assert_eq!(depot.counters().get("depot.discarded"), 1);
        assert_eq!(depot.len(), 1);
    }
}
