//! End-to-end resolution through domains built by the factory.

use plugbridge_common::config::{BridgeConfig, LibrariesSection, NamespaceSection};
use plugbridge_common::provision::{
    ArtifactFetcher, FetchError, ProvisionedSet, Provisioner, RuntimeLibrary,
};
use plugbridge_host::{
    DomainError, DomainFactory, ModuleOrigin, ModuleResolver, ResolutionError, StaticResolver,
    TierKind,
};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;
use zip::write::SimpleFileOptions;

const CORE_V1: RuntimeLibrary = RuntimeLibrary::maven("lang-core", "org.example", "lang-core", "1.0");
const CORE_V2: RuntimeLibrary = RuntimeLibrary::maven("lang-core", "org.example", "lang-core", "2.0");

struct NoNetwork;

impl ArtifactFetcher for NoNetwork {
    fn fetch(&self, url: &str, _sink: &mut dyn Write) -> Result<u64, FetchError> {
        Err(FetchError::Network(format!("unexpected fetch of {}", url)))
    }
}

fn write_jar(path: &Path, entries: &[(&str, &str)]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    let mut zip = zip::ZipWriter::new(File::create(path).unwrap());
    for (name, body) in entries {
        zip.start_file(*name, SimpleFileOptions::default()).unwrap();
        zip.write_all(body.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
}

fn config() -> BridgeConfig {
    BridgeConfig {
        namespaces: NamespaceSection {
            bootstrap: vec!["sys.".to_string()],
            host: vec!["host.".to_string()],
            runtime: vec!["lang.".to_string()],
        },
        ..Default::default()
    }
}

/// Lay out a library directory holding `library` and provision it offline.
fn provision(dir: &Path, library: RuntimeLibrary, entries: &[(&str, &str)]) -> ProvisionedSet {
    write_jar(&dir.join(library.file_name()), entries);
    let libraries = LibrariesSection {
        directory: dir.to_path_buf(),
        ..Default::default()
    };
    Provisioner::new(&libraries, Arc::new(NoNetwork))
        .ensure(&[library])
        .unwrap()
}

struct Fixture {
    _temp: TempDir,
    root: PathBuf,
    factory: DomainFactory,
    host: Arc<dyn ModuleResolver>,
    provisioned: ProvisionedSet,
    extension: PathBuf,
}

fn fixture() -> Fixture {
    let temp = TempDir::new().unwrap();
    let root = temp.path().to_path_buf();

    let provisioned = provision(
        &root.join("libraries"),
        CORE_V1,
        &[("lang/Core.class", "core v1"), ("lang/Only.class", "only")],
    );

    let extension = root.join("plugins").join("example.jar");
    write_jar(
        &extension,
        &[
            ("ext/Main.class", "main"),
            ("host/Private.class", "extension private"),
            ("host/Api.class", "extension copy of api"),
            ("sys/Forged.class", "forged"),
            ("shared/Thing.class", "extension thing"),
            ("plugin.yml", "name: example"),
        ],
    );

    let host: Arc<dyn ModuleResolver> = Arc::new(
        StaticResolver::new("host")
            .with_module("host.Api", &b"host api"[..])
            .with_module("lang.Core", &b"host copy of core"[..])
            .with_module("shared.Thing", &b"host thing"[..])
            .with_module("other.Plugin", &b"other plugin"[..])
            .with_resource("plugin.yml", "name: host")
            .with_resource("host-only.txt", "from host"),
    );

    let bootstrap = StaticResolver::new("bootstrap").with_module("sys.Object", &b"object"[..]);
    let factory = DomainFactory::new(&config(), Arc::new(bootstrap), &[CORE_V1]);

    Fixture {
        _temp: temp,
        root,
        factory,
        host,
        provisioned,
        extension,
    }
}

#[test]
fn same_archive_yields_same_domain() {
    let f = fixture();
    let other = f.root.join("plugins").join("other.jar");
    write_jar(&other, &[("other/Main.class", "x")]);

    let first = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();
    let again = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();
    let via_alias = f
        .factory
        .create_domain(
            &f.root.join("plugins").join("..").join("plugins").join("example.jar"),
            &f.host,
            &f.provisioned,
        )
        .unwrap();
    let distinct = f.factory.create_domain(&other, &f.host, &f.provisioned).unwrap();

    assert!(Arc::ptr_eq(&first, &again));
    assert!(Arc::ptr_eq(&first, &via_alias));
    assert!(!Arc::ptr_eq(&first, &distinct));
    assert_eq!(f.factory.len(), 2);
}

#[test]
fn concurrent_creation_builds_one_domain() {
    let f = Arc::new(fixture());
    let barrier = Arc::new(Barrier::new(8));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let f = f.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                barrier.wait();
                f.factory
                    .create_domain(&f.extension, &f.host, &f.provisioned)
                    .unwrap()
            })
        })
        .collect();

    let domains: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(domains.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    assert_eq!(f.factory.len(), 1);
}

#[test]
fn names_resolve_through_their_tiers() {
    let f = fixture();
    let domain = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();

    let api = domain.resolve_traced("host.Api").unwrap();
    assert_eq!(api.tier, TierKind::Host);
    assert!(Arc::ptr_eq(&api.module, &f.host.resolve("host.Api").unwrap()));

    let core = domain.resolve_traced("lang.Core").unwrap();
    assert_eq!(core.tier, TierKind::Runtime);
    assert_eq!(core.module.bytes(), b"core v1");
    assert_eq!(
        core.module.archive(),
        f.provisioned.path_of(&CORE_V1)
    );

    let main = domain.resolve_traced("ext.Main").unwrap();
    assert_eq!(main.tier, TierKind::Extension);
    assert_eq!(main.module.bytes(), b"main");
    assert_eq!(main.module.archive(), Some(domain.archive()));

    let err = domain.resolve("unknown.Name").unwrap_err();
    assert!(matches!(err, ResolutionError::NotFound { ref name, .. } if name == "unknown.Name"));
    assert!(err.to_string().contains("example.jar"));
}

#[test]
fn host_prefixed_names_fall_through_to_the_extension() {
    let f = fixture();
    let domain = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();

    let private = domain.resolve_traced("host.Private").unwrap();
    assert_eq!(private.tier, TierKind::Extension);
    assert_eq!(private.module.bytes(), b"extension private");
}

#[test]
fn extension_shadows_host_outside_host_namespaces() {
    let f = fixture();
    let domain = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();

    let thing = domain.resolve_traced("shared.Thing").unwrap();
    assert_eq!(thing.tier, TierKind::Extension);
    assert_eq!(thing.module.bytes(), b"extension thing");

    // Only the host knows this one: last-resort delegation.
    let other = domain.resolve_traced("other.Plugin").unwrap();
    assert_eq!(other.tier, TierKind::Host);
}

#[test]
fn runtime_names_fall_back_to_extension_then_host() {
    let f = fixture();
    let domain = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();

    assert_eq!(
        domain.resolve_traced("lang.Only").unwrap().tier,
        TierKind::Runtime
    );
    assert!(domain.resolve("lang.Missing").unwrap_err().is_not_found());
}

#[test]
fn bootstrap_namespace_is_never_shadowed() {
    let f = fixture();
    let domain = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();

    let object = domain.resolve_traced("sys.Object").unwrap();
    assert_eq!(object.tier, TierKind::Bootstrap);
    assert_eq!(object.module.origin(), &ModuleOrigin::Memory);

    // Present in the extension archive, but bootstrap misses are final.
    assert!(domain.resolve("sys.Forged").unwrap_err().is_not_found());
}

#[test]
fn results_are_cached_and_monotonic() {
    let temp = TempDir::new().unwrap();
    let provisioned = provision(&temp.path().join("libs"), CORE_V1, &[("lang/Core.class", "v1")]);
    let extension = temp.path().join("exploded");
    std::fs::create_dir_all(extension.join("ext")).unwrap();
    std::fs::write(extension.join("ext/Main.class"), "main").unwrap();

    let host: Arc<dyn ModuleResolver> = Arc::new(StaticResolver::new("host"));
    let factory = DomainFactory::new(
        &config(),
        Arc::new(StaticResolver::new("bootstrap")),
        &[CORE_V1],
    );
    let domain = factory.create_domain(&extension, &host, &provisioned).unwrap();

    let first = domain.resolve("ext.Main").unwrap();
    std::fs::write(extension.join("ext/Main.class"), "rewritten").unwrap();
    let second = domain.resolve("ext.Main").unwrap();
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(second.bytes(), b"main");

    assert!(domain.resolve("ext.Later").is_err());
    std::fs::write(extension.join("ext/Later.class"), "late").unwrap();
    assert!(domain.resolve("ext.Later").is_err());

    assert_eq!(domain.cached_names(), 2);
}

#[test]
fn domains_are_isolated_from_each_other() {
    let temp = TempDir::new().unwrap();
    let set_v1 = provision(
        &temp.path().join("libs-v1"),
        CORE_V1,
        &[("lang/Core.class", "core v1")],
    );
    let set_v2 = provision(
        &temp.path().join("libs-v2"),
        CORE_V2,
        &[("lang/Core.class", "core v2")],
    );

    let first_ext = temp.path().join("first.jar");
    let second_ext = temp.path().join("second.jar");
    write_jar(&first_ext, &[("first/Main.class", "1")]);
    write_jar(&second_ext, &[("second/Main.class", "2")]);

    let host: Arc<dyn ModuleResolver> =
        Arc::new(StaticResolver::new("host").with_module("host.Api", &b"api"[..]));
    let factory = DomainFactory::new(&config(), Arc::new(StaticResolver::new("bootstrap")), &[]);

    let first = factory.create_domain(&first_ext, &host, &set_v1).unwrap();
    let second = factory.create_domain(&second_ext, &host, &set_v2).unwrap();

    // Warm the first domain's cache; the second must be unaffected.
    assert_eq!(first.resolve("lang.Core").unwrap().bytes(), b"core v1");
    assert_eq!(second.cached_names(), 0);
    assert_eq!(second.resolve("lang.Core").unwrap().bytes(), b"core v2");
    assert_eq!(first.resolve("lang.Core").unwrap().bytes(), b"core v1");

    // Extension code is private too.
    assert!(first.resolve("second.Main").is_err());
    assert!(second.resolve("first.Main").is_err());

    // Host API types are shared.
    assert!(Arc::ptr_eq(
        &first.resolve("host.Api").unwrap(),
        &second.resolve("host.Api").unwrap()
    ));
}

#[test]
fn same_library_still_yields_private_module_instances() {
    let f = fixture();
    let other = f.root.join("plugins").join("other.jar");
    write_jar(&other, &[("other/Main.class", "x")]);

    let first = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();
    let second = f.factory.create_domain(&other, &f.host, &f.provisioned).unwrap();

    let a = first.resolve("lang.Core").unwrap();
    let b = second.resolve("lang.Core").unwrap();
    assert_eq!(a.bytes(), b.bytes());
    assert!(!Arc::ptr_eq(&a, &b));
}

#[test]
fn resources_prefer_the_extension_archive() {
    let f = fixture();
    let domain = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();

    assert_eq!(
        domain.get_resource("plugin.yml").unwrap(),
        Some(b"name: example".to_vec())
    );
    assert_eq!(
        domain.get_resource("host-only.txt").unwrap(),
        Some(b"from host".to_vec())
    );
    assert_eq!(domain.get_resource("absent.txt").unwrap(), None);
}

#[test]
fn dropped_host_is_skipped() {
    let f = fixture();
    let host: Arc<dyn ModuleResolver> =
        Arc::new(StaticResolver::new("short-lived").with_module("host.Api", &b"api"[..]));
    let domain = f.factory.create_domain(&f.extension, &host, &f.provisioned).unwrap();
    drop(host);

    // The extension's own copy is all that is left.
    let api = domain.resolve_traced("host.Api").unwrap();
    assert_eq!(api.tier, TierKind::Extension);
    assert!(domain.resolve("other.Plugin").is_err());
    assert_eq!(domain.get_resource("host-only.txt").unwrap(), None);
}

#[test]
fn a_domain_can_host_another_extension() {
    let f = fixture();
    let provider = f.factory.create_domain(&f.extension, &f.host, &f.provisioned).unwrap();
    let provider_as_host: Arc<dyn ModuleResolver> = provider.clone();

    let dependent_jar = f.root.join("plugins").join("dependent.jar");
    write_jar(&dependent_jar, &[("dep/Main.class", "dep")]);
    let dependent = f
        .factory
        .create_domain(&dependent_jar, &provider_as_host, &f.provisioned)
        .unwrap();

    let main = dependent.resolve_traced("ext.Main").unwrap();
    assert_eq!(main.tier, TierKind::Host);
    assert!(Arc::ptr_eq(&main.module, &provider.resolve("ext.Main").unwrap()));
}

#[test]
fn stale_provisioned_set_is_rejected() {
    let f = fixture();
    std::fs::remove_file(f.provisioned.path_of(&CORE_V1).unwrap()).unwrap();

    let err = f
        .factory
        .create_domain(&f.extension, &f.host, &f.provisioned)
        .unwrap_err();
    assert!(matches!(err, DomainError::LibraryMissing { .. }));
    assert!(err.to_string().contains("lang-core 1.0"));
}
