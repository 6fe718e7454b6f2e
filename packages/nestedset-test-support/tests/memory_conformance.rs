use nestedset_core::MemoryNodeStore;
use nestedset_test_support::conformance;

#[test]
fn memory_store_conformance() {
    conformance::run_all(MemoryNodeStore::new);
}
