//! Resolution, identity and streaming behavior of the resource index

use rstest::{fixture, rstest};
use static_cache::center::{CenterOptions, ChangeEvent, ChannelSource, Origin};
use static_cache::resource::BlockData;
use static_cache::{Resolution, ResourceCenter, ResourceKind};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn write(root: &Path, name: &str, content: &[u8]) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, content).unwrap();
}

#[fixture]
fn site() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "index.htm", b"<h1>fallback page</h1>");
    write(dir.path(), "css/site.css", b"body { margin: 0 }");
    write(dir.path(), "img/photo.jpg", &(0..=255u8).cycle().take(10_000).collect::<Vec<_>>());
    write(dir.path(), "app.xyz", b"not servable");
    dir
}

fn resolved_url(resolution: &Resolution) -> Option<&str> {
    match resolution {
        Resolution::Found { resource, .. } => Some(resource.url()),
        _ => None,
    }
}

#[rstest]
#[case("/", Some("/index.htm"))]
#[case("/css/site.css", Some("/css/site.css"))]
#[case("/CSS/Site.CSS", Some("/css/site.css"))]
#[case("//css//site.css", Some("/css/site.css"))]
#[case("/img/photo.jpg", Some("/img/photo.jpg"))]
#[case("/missing.css", None)]
#[case("/css/../../etc/passwd.txt", None)]
fn test_resolve_paths(site: TempDir, #[case] request: &str, #[case] expected: Option<&str>) {
    let center = ResourceCenter::new(CenterOptions::new(site.path()));
    center.initialize();
    assert_eq!(resolved_url(&center.resolve(request)), expected);
}

#[rstest]
fn test_unregistered_extension_is_not_supported(site: TempDir) {
    let center = ResourceCenter::new(CenterOptions::new(site.path()));
    center.initialize();
    assert!(site.path().join("app.xyz").is_file());
    assert!(matches!(center.resolve("/app.xyz"), Resolution::NotSupported));
    assert!(matches!(center.resolve("/noext"), Resolution::NotSupported));
}

#[rstest]
fn test_default_pages_in_order(site: TempDir) {
    let center = ResourceCenter::new(CenterOptions::new(site.path()));
    assert_eq!(resolved_url(&center.resolve("/")), Some("/index.htm"));

    write(site.path(), "index.html", b"<h1>preferred</h1>");
    assert_eq!(resolved_url(&center.resolve("/")), Some("/index.html"));
}

#[test]
fn test_root_without_default_page_is_not_found() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "a.css", b"a{}");
    let center = ResourceCenter::new(CenterOptions::new(dir.path()));
    center.initialize();
    assert!(matches!(center.resolve("/"), Resolution::NotFound));
}

#[rstest]
fn test_repeated_resolution_returns_same_instance(site: TempDir) {
    let center = ResourceCenter::new(CenterOptions::new(site.path()));

    let Resolution::Found { resource: first, origin, .. } = center.resolve("/css/site.css") else {
        panic!("expected a resource");
    };
    assert_eq!(origin, Origin::Loaded);

    write(site.path(), "css/site.css", b"body { margin: 1px }");
    let reloaded = center.create_resource(&center.root().join("css/site.css")).unwrap();
    let Resolution::Found { resource: second, origin, .. } = center.resolve("/css/site.css") else {
        panic!("expected a resource");
    };
    assert_eq!(origin, Origin::Cached);
    assert!(Arc::ptr_eq(&first, &reloaded));
    assert!(Arc::ptr_eq(&first, &second));
}

#[rstest]
fn test_concurrent_cold_loads_share_one_instance(site: TempDir) {
    let center = Arc::new(ResourceCenter::new(CenterOptions::new(site.path())));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let center = Arc::clone(&center);
            std::thread::spawn(move || match center.resolve("/css/site.css") {
                Resolution::Found { resource, .. } => resource,
                other => panic!("unexpected {other:?}"),
            })
        })
        .collect();
    let resources: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for resource in &resources[1..] {
        assert!(Arc::ptr_eq(&resources[0], resource));
    }
}

#[rstest]
fn test_streamed_ranges_reuse_released_buffers(site: TempDir) {
    let center = ResourceCenter::new(CenterOptions::new(site.path()));
    center.initialize();
    let photo = center.get("/img/photo.jpg").unwrap();
    assert_eq!(photo.kind(), ResourceKind::Streamed);
    assert!(photo.long_lived());
    assert_eq!(photo.length(), 10_000);

    let first = photo.read_range(0, 4096);
    assert_eq!(first.len(), 4096);
    assert_eq!(first.next_offset, 4096);
    let first_ptr = first.as_slice().as_ptr();
    let BlockData::Pooled { buffer, .. } = first.data else {
        panic!("streamed reads use pooled buffers");
    };
    photo.release(buffer);
    assert_eq!(photo.pooled_buffers(), 1);

    let second = photo.read_range(4096, 4096);
    assert_eq!(second.len(), 4096);
    assert_eq!(second.as_slice().as_ptr(), first_ptr);
    assert_eq!(second.as_slice()[0], (4096 % 256) as u8);

    let tail = photo.read_range(second.next_offset, 4096);
    assert_eq!(tail.len(), 10_000 - 8192);
    assert!(photo.read_range(10_000, 16).is_empty());
}

#[rstest]
fn test_buffered_resource_hashes_raw_bytes(site: TempDir) {
    let center = ResourceCenter::new(CenterOptions::new(site.path()));
    center.initialize();
    let css = center.get("/css/site.css").unwrap();
    assert!(css.precompressed());
    assert!(!css.long_lived());
    assert_eq!(css.source_length(), 18);
    // md5("body { margin: 0 }")
    assert_eq!(css.content_hash().len(), 32);

    let streamed = ResourceCenter::new(
        CenterOptions::new(site.path()).with_resource_types("css;jpg"),
    );
    // same bytes, same hash regardless of representation
    write(site.path(), "img/copy.jpg", b"body { margin: 0 }");
    let copy = streamed
        .create_resource(&streamed.root().join("img/copy.jpg"))
        .unwrap();
    assert_eq!(copy.content_hash(), css.content_hash());
}

#[tokio::test]
async fn test_change_event_replaces_resource() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "app.js", b"let version = 1;");
    let center = Arc::new(ResourceCenter::new(
        CenterOptions::new(dir.path()).with_reload_interval(Duration::ZERO),
    ));
    center.initialize();
    let old = center.get("/app.js").unwrap();

    let (source, events) = ChannelSource::new();
    let task = center.start_watching(&source).unwrap();

    write(dir.path(), "app.js", b"let version = 2;");
    events
        .send(ChangeEvent {
            path: center.root().join("app.js"),
        })
        .unwrap();

    let mut replaced = None;
    for _ in 0..100 {
        let current = center.get("/app.js").unwrap();
        if !Arc::ptr_eq(&current, &old) {
            replaced = Some(current);
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    let replaced = replaced.expect("resource was not reloaded");
    assert_ne!(replaced.content_hash(), old.content_hash());
    // the previous instance stays intact for readers still holding it
    assert_eq!(old.source_length(), 16);
    assert!(!old.read_range(0, 1024).is_empty());

    task.shutdown().await;
}
