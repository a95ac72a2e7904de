use criterion::{criterion_group, criterion_main, Criterion};
use tag_hub_core::{
    AccessControl, Grant, GrantTable, Holder, Hub, ObjectRef, Permission, Principal,
};
use uuid::Uuid;

fn bench_permission_checks(c: &mut Criterion) {
    let mut grants = GrantTable::new();
    let mut objects = Vec::new();
    for i in 0..10_000 {
        let object = ObjectRef::tag(Uuid::new_v4());
        grants.grant(Grant::on(format!("user{}", i % 100), Permission::TagView, object));
        objects.push(object);
    }
    grants.grant(Grant::global(Holder::role("auditors"), Permission::TagView));
    let user = Principal::user("user7");
    let auditor = Principal::user("eve").with_roles(["auditors"]);

    c.bench_function("has_permission_object", |b| {
        b.iter(|| {
            objects
                .iter()
                .filter(|o| grants.has_permission(&user, Permission::TagView, Some(**o)))
                .count()
        })
    });
    c.bench_function("has_permission_global", |b| {
        b.iter(|| grants.has_permission(&auditor, Permission::TagView, Some(objects[0])))
    });
}

fn bench_filtered_listing(c: &mut Criterion) {
    let admin = Principal::superuser("admin");
    let mut hub = Hub::in_memory();
    let mut granted = Vec::new();
    for i in 0..1_000 {
        let tag = hub.create_tag(&admin, &format!("tag{i}"), None).unwrap();
        if i % 10 == 0 {
            granted.push(Grant::on("alice", Permission::TagView, ObjectRef::tag(tag.id)));
        }
    }
    for grant in granted {
        hub.grant(&admin, grant).unwrap();
    }
    let alice = Principal::user("alice");

    c.bench_function("list_tags_filtered", |b| b.iter(|| hub.list_tags(&alice).len()));
}

criterion_group!(benches, bench_permission_checks, bench_filtered_listing);
criterion_main!(benches);
