// tests/remote.rs

//! Remote repositories served from a local HTTP server.

mod common;

use common::*;
use mockito::{Server, ServerGuard};
use serde_json::json;
use std::sync::Arc;
use tempfile::TempDir;
use tpexport::repository::LoadFlags;
use tpexport::{
    Agent, ArtifactDescriptor, ArtifactKey, ArtifactRepository, CancellationToken, Error,
    InstallableUnit, MetadataRepository, MirrorOperation, MirrorOptions, MirrorRequest,
    ProvisioningContext, Repository, RepositoryLocation, SilentProgress,
};

const PAYLOAD: &[u8] = b"remote bundle payload";

fn remote_location(server: &ServerGuard, path: &str) -> RepositoryLocation {
    RepositoryLocation::parse(&format!("{}{}", server.url(), path)).unwrap()
}

fn artifact_index(key: &ArtifactKey) -> String {
    json!({
        "name": "Remote",
        "type": "simple",
        "version": 1,
        "entries": [ArtifactDescriptor::for_content(key.clone(), PAYLOAD)],
    })
    .to_string()
}

fn content_index(units: &[InstallableUnit]) -> Vec<u8> {
    let json = json!({
        "name": "Remote",
        "type": "simple",
        "version": 1,
        "entries": units,
    })
    .to_string();
    zstd::encode_all(json.as_bytes(), 3).unwrap()
}

#[test]
fn test_mirror_from_remote_repository() {
    let mut server = Server::new();
    let unit = bundle_unit("org.example.remote", "1.0");
    let key = ArtifactKey::bundle("org.example.remote", "1.0");

    let compressed_missing = server
        .mock("GET", "/repo/artifacts.json.zst")
        .with_status(404)
        .create();
    let plain_index = server
        .mock("GET", "/repo/artifacts.json")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(artifact_index(&key))
        .create();
    let payload = server
        .mock("GET", "/repo/plugins/org.example.remote_1.0.jar")
        .with_status(200)
        .with_body(PAYLOAD)
        .expect(1)
        .create();

    let temp = TempDir::new().unwrap();
    let source = remote_location(&server, "/repo");
    let (dest, dest_input) = destination(temp.path(), "out");

    let agent = Arc::new(Agent::with_defaults().unwrap());
    let context = ProvisioningContext::with_agent(Arc::clone(&agent));
    let request = MirrorRequest::new(&dest_input)
        .with_source(source.clone())
        .with_unit(unit.clone());
    let status = MirrorOperation::new(&context, MirrorOptions::default())
        .mirror(&request, &SilentProgress::new(), &CancellationToken::new())
        .unwrap();

    assert!(status.problems().is_empty(), "{status}");
    compressed_missing.assert();
    plain_index.assert();
    payload.assert();

    let artifacts = open_artifacts(&dest);
    let descriptor = &artifacts.descriptors(&key)[0];
    assert_eq!(artifacts.read(descriptor).unwrap(), PAYLOAD);
    assert!(open_metadata(&dest).contains_unit(&unit));
    assert!(none_registered(&agent, &[&source, &dest]));
}

#[test]
fn test_compressed_remote_index_preferred() {
    let mut server = Server::new();
    let units = vec![bundle_unit("a", "1"), bundle_unit("b", "2")];

    let compressed = server
        .mock("GET", "/repo/content.json.zst")
        .with_status(200)
        .with_body(content_index(&units))
        .create();
    let plain = server
        .mock("GET", "/repo/content.json")
        .with_status(200)
        .expect(0)
        .create();

    let agent = Agent::with_defaults().unwrap();
    let location = remote_location(&server, "/repo");
    let metadata = agent
        .metadata_manager()
        .load_repository(&location, LoadFlags::NONE)
        .unwrap();

    assert_eq!(metadata.units(), units);
    assert!(!metadata.is_modifiable());
    compressed.assert();
    plain.assert();
}

#[test]
fn test_missing_remote_repository_is_not_found() {
    let mut server = Server::new();
    let _compressed = server
        .mock("GET", "/missing/artifacts.json.zst")
        .with_status(404)
        .create();
    let _plain = server
        .mock("GET", "/missing/artifacts.json")
        .with_status(404)
        .create();

    let agent = Agent::with_defaults().unwrap();
    let location = remote_location(&server, "/missing");
    let err = agent
        .artifact_manager()
        .load_repository(&location, LoadFlags::NONE)
        .err()
        .unwrap();

    assert!(matches!(err, Error::RepositoryNotFound(_)));
    assert!(!agent.artifact_manager().contains(&location));
}

#[test]
fn test_server_errors_are_retried() {
    let mut server = Server::new();
    let failing = server
        .mock("GET", "/flaky/artifacts.json.zst")
        .with_status(503)
        .expect(3)
        .create();

    let agent = Agent::with_defaults().unwrap();
    let location = remote_location(&server, "/flaky");
    let err = agent
        .artifact_manager()
        .load_repository(&location, LoadFlags::NONE)
        .err()
        .unwrap();

    assert!(matches!(err, Error::Download(_)));
    failing.assert();
}

#[test]
fn test_remote_repository_refuses_writes() {
    let mut server = Server::new();
    let key = ArtifactKey::bundle("org.example.remote", "1.0");
    let _compressed = server
        .mock("GET", "/repo/artifacts.json.zst")
        .with_status(404)
        .create();
    let _plain = server
        .mock("GET", "/repo/artifacts.json")
        .with_status(200)
        .with_body(artifact_index(&key))
        .create();

    let agent = Agent::with_defaults().unwrap();
    let location = remote_location(&server, "/repo");
    let artifacts = agent
        .artifact_manager()
        .load_repository(&location, LoadFlags::NONE)
        .unwrap();

    assert!(artifacts.contains(&key));
    assert!(matches!(
        artifacts.write(&ArtifactDescriptor::new(key), b"x"),
        Err(Error::NotModifiableRepository(_))
    ));
}
