use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use area_index::AreaIndex;
use serde_json::{json, Value};
use tempfile::TempDir;
use world_server::{FileStorage, Server, ServerConfig, ServerState};

struct TestWorld {
    _dir: TempDir,
    data_dir: PathBuf,
    index: Arc<AreaIndex>,
    server: Server,
    client: reqwest::Client,
}

impl TestWorld {
    fn api(&self, path: &str) -> String {
        format!("http://{}{}", self.server.api_addr(), path)
    }

    fn thingdefs(&self, path: &str) -> String {
        format!("http://{}{}", self.server.thingdefs_addr(), path)
    }

    fn areabundles(&self, path: &str) -> String {
        format!("http://{}{}", self.server.areabundles_addr(), path)
    }

    async fn post_json(&self, path: &str, body: Value) -> (u16, Value) {
        let response = self
            .client
            .post(self.api(path))
            .json(&body)
            .send()
            .await
            .expect("request");
        let status = response.status().as_u16();
        (status, response.json().await.expect("json body"))
    }

    async fn post_form(&self, path: &str, form: &[(&str, &str)]) -> (u16, Value) {
        let response = self
            .client
            .post(self.api(path))
            .form(form)
            .send()
            .await
            .expect("request");
        let status = response.status().as_u16();
        (status, response.json().await.expect("json body"))
    }

    async fn get_json(&self, path: &str) -> (u16, Value) {
        let response = self.client.get(self.api(path)).send().await.expect("request");
        let status = response.status().as_u16();
        (status, response.json().await.expect("json body"))
    }

    fn read_data(&self, relative: &str) -> Value {
        let raw = fs::read(self.data_dir.join(relative)).expect("data file");
        serde_json::from_slice(&raw).expect("data json")
    }
}

fn write_json(path: &Path, value: Value) {
    fs::create_dir_all(path.parent().expect("parent")).expect("dirs");
    fs::write(path, serde_json::to_vec(&value).expect("serialize")).expect("write");
}

fn seed_default(data_dir: &Path) {
    write_json(&data_dir.join("area/info/area1.json"), json!({ "name": "Lobby" }));
    write_json(
        &data_dir.join("area/load/area1.json"),
        json!({ "ok": true, "areaId": "area1", "areaName": "Lobby", "placements": [] }),
    );
    write_json(
        &data_dir.join("person/account.json"),
        json!({ "personId": "person1", "screenName": "Ada" }),
    );
}

async fn start_world(seed: impl FnOnce(&Path)) -> TestWorld {
    let dir = tempfile::tempdir().expect("tempdir");
    let data_dir = dir.path().join("data");
    fs::create_dir_all(data_dir.join("area/info")).expect("info dir");
    seed(&data_dir);

    let config = ServerConfig {
        host: "127.0.0.1".to_string(),
        api_port: 0,
        thingdefs_port: 0,
        areabundles_port: 0,
        data_dir: data_dir.clone(),
        cache_dir: dir.path().join("cache"),
        ..ServerConfig::default()
    };
    let index = Arc::new(AreaIndex::new(config.index_paths()));
    index.build().expect("index build");

    let state = Arc::new(ServerState::new(
        Arc::new(FileStorage::new(data_dir.clone())),
        index.clone(),
    ));
    let server = Server::start(state, &config).await.expect("server");

    TestWorld {
        _dir: dir,
        data_dir,
        index,
        server,
        client: reqwest::Client::new(),
    }
}

#[tokio::test]
async fn load_by_url_name_resolves_through_the_index() {
    let world = start_world(seed_default).await;

    let (status, body) = world
        .post_json("/area/load", json!({ "areaUrlName": "Lobby" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["areaId"], "area1");

    let (status, body) = world.post_form("/area/load", &[("areaUrlName", "Lobby")]).await;
    assert_eq!(status, 200);
    assert_eq!(body["areaName"], "Lobby");
}

#[tokio::test]
async fn unknown_areas_are_denied_as_private_with_200() {
    let world = start_world(seed_default).await;
    let denied = json!({ "ok": false, "_reasonDenied": "Private", "serveTime": 13 });

    for body in [
        json!({ "areaUrlName": "Nowhere" }),
        json!({ "areaId": "missing" }),
        json!({ "areaId": "../escape" }),
        json!({}),
    ] {
        let (status, response) = world.post_json("/area/load", body).await;
        assert_eq!(status, 200);
        assert_eq!(response, denied);
    }
}

#[tokio::test]
async fn load_by_id_marks_requestor_as_owner() {
    let world = start_world(seed_default).await;
    let (status, body) = world.post_json("/area/load", json!({ "areaId": "area1" })).await;
    assert_eq!(status, 200);
    assert_eq!(body["areaName"], "Lobby");
    assert_eq!(body["requestorIsOwner"], true);
    assert_eq!(body["hasEditToolsPermanently"], true);
    assert_eq!(body["editToolsExpiryDate"], Value::Null);
    assert_eq!(body["isInEditToolsTrial"], false);
}

#[tokio::test]
async fn created_area_is_indexed_listed_and_served() {
    let world = start_world(seed_default).await;

    let (status, created) = world.post_form("/area", &[("name", "Sunset Beach")]).await;
    assert_eq!(status, 200);
    let area_id = created["id"].as_str().expect("id").to_string();
    assert_eq!(area_id.len(), 24);

    let (_, found) = world.post_json("/area/search", json!({ "term": "Sunset" })).await;
    assert_eq!(found["areas"], json!([{ "id": area_id, "name": "Sunset Beach", "playerCount": 0 }]));
    assert_eq!(found["ownPrivateAreas"], json!([]));

    let (_, everything) = world.post_json("/area/search", json!({ "term": "" })).await;
    assert_eq!(everything["areas"].as_array().map(Vec::len), Some(2));

    let (_, loaded) = world
        .post_json("/area/load", json!({ "areaUrlName": "SunsetBeach" }))
        .await;
    assert_eq!(loaded["areaId"], area_id.as_str());
    assert_eq!(loaded["areaCreatorId"], "person1");

    let cache: Value = serde_json::from_slice(
        &fs::read(&world.index.paths().cache_path).expect("cache file"),
    )
    .expect("cache json");
    assert!(cache
        .as_array()
        .expect("array")
        .iter()
        .any(|entry| entry["id"] == area_id.as_str()));

    let info = world.read_data(&format!("area/info/{area_id}.json"));
    assert_eq!(info["name"], "Sunset Beach");
    assert_eq!(info["editors"][0]["id"], "person1");

    let account = world.read_data("person/account.json");
    assert_eq!(account["ownedAreas"], json!([area_id]));

    let (_, lists) = world.post_json("/area/lists", json!({})).await;
    assert_eq!(lists["created"][0]["id"], area_id.as_str());
    assert_eq!(lists["newest"][0]["name"], "Sunset Beach");
    assert_eq!(lists["totalAreas"], 1);

    let bundle_key = loaded["areaKey"].as_str().expect("bundle key");
    let bundle: Value = world
        .client
        .get(world.areabundles(&format!("/{area_id}/{bundle_key}")))
        .send()
        .await
        .expect("bundle request")
        .json()
        .await
        .expect("bundle json");
    assert_eq!(bundle, json!({ "thingDefinitions": [], "serveTime": 0 }));
}

#[tokio::test]
async fn create_rejects_missing_name_and_missing_account() {
    let world = start_world(seed_default).await;
    let (status, body) = world.post_form("/area", &[("name", "")]).await;
    assert_eq!(status, 400);
    assert_eq!(body["ok"], false);
    assert_eq!(body["error"]["code"], "bad_request");

    let world = start_world(|data_dir| {
        write_json(&data_dir.join("area/info/area1.json"), json!({ "name": "Lobby" }));
    })
    .await;
    let (status, _) = world.post_form("/area", &[("name", "Orphan")]).await;
    assert_eq!(status, 500);
    assert_eq!(world.index.len(), 1);
}

#[tokio::test]
async fn saved_area_gains_info_document_and_index_entry() {
    let world = start_world(seed_default).await;
    let (status, body) = world
        .post_json(
            "/area/save",
            json!({ "id": "saved1", "name": "Moonrise", "description": "night", "creatorId": "x" }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "ok": true, "id": "saved1" }));

    let load = world.read_data("area/load/saved1.json");
    assert_eq!(load["creatorId"], "person1");
    assert_eq!(world.read_data("area/info/saved1.json")["name"], "Moonrise");
    assert_eq!(world.index.lookup_by_url_name("Moonrise").as_deref(), Some("saved1"));

    // A rebuild from disk still finds it.
    world.index.rebuild().expect("rebuild");
    let entry = world.index.get("saved1").expect("indexed after rebuild");
    assert_eq!(entry.description.as_deref(), Some("night"));
}

#[tokio::test]
async fn search_by_creator_reads_the_stored_page() {
    let world = start_world(|data_dir| {
        seed_default(data_dir);
        write_json(
            &data_dir.join("person/areasearch/person1.json"),
            json!({ "areas": [{ "id": "area1" }], "ownPrivateAreas": [] }),
        );
    })
    .await;

    let (_, body) = world
        .post_json("/area/search", json!({ "term": "", "byCreatorId": "person1" }))
        .await;
    assert_eq!(body["areas"], json!([{ "id": "area1" }]));

    let (_, body) = world
        .post_json("/area/search", json!({ "term": "", "byCreatorId": "nobody" }))
        .await;
    assert_eq!(body, json!({ "areas": [], "ownPrivateAreas": [] }));
}

#[tokio::test]
async fn info_subareas_and_visit() {
    let world = start_world(seed_default).await;

    let (status, info) = world.post_json("/area/info", json!({ "areaId": "area1" })).await;
    assert_eq!(status, 200);
    assert_eq!(info["name"], "Lobby");
    let (status, _) = world.post_json("/area/info", json!({ "areaId": "missing" })).await;
    assert_eq!(status, 404);

    let (_, subareas) = world
        .post_json("/area/getsubareas", json!({ "areaId": "area1" }))
        .await;
    assert_eq!(subareas, json!({ "subAreas": [] }));

    for _ in 0..2 {
        let (status, body) = world
            .post_json("/area/visit", json!({ "areaId": "area1", "name": "Lobby" }))
            .await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "ok": true }));
    }
    let (_, lists) = world.post_json("/area/lists", json!({})).await;
    assert_eq!(lists["visited"], json!([{ "id": "area1", "name": "Lobby", "playerCount": 0 }]));

    let (status, _) = world.post_json("/area/visit", json!({ "areaId": "area1" })).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn environment_changers_are_merged_into_the_load_document() {
    let world = start_world(seed_default).await;
    let (status, _) = world
        .post_form(
            "/area/updatesettings",
            &[("areaId", "area1"), ("environmentChanger", r#"{"Name":"Sky","Tint":1}"#)],
        )
        .await;
    assert_eq!(status, 200);

    let load = world.read_data("area/load/area1.json");
    let changers: Value =
        serde_json::from_str(load["environmentChangersJSON"].as_str().expect("string"))
            .expect("changers json");
    assert_eq!(changers, json!({ "environmentChangers": [{ "Name": "Sky", "Tint": 1 }] }));

    let (status, _) = world
        .post_form(
            "/area/updatesettings",
            &[("areaId", "area1"), ("environmentChanger", "{broken")],
        )
        .await;
    assert_eq!(status, 400);
    let (status, _) = world
        .post_form("/area/updatesettings", &[("areaId", "missing")])
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn placement_lifecycle() {
    let world = start_world(seed_default).await;
    let placement = urlencoding::encode(r#"{"Id":"pl1","Tid":"thing1","P":{"x":1}}"#).into_owned();

    let (status, body) = world
        .post_form("/placement/new", &[("areaId", "area1"), ("placement", &placement)])
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "ok": true }));

    let (status, metadata) = world
        .post_json("/placement/metadata", json!({ "areaId": "area1", "placementId": "pl1" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        metadata,
        json!({ "placerId": "person1", "placerName": "Ada", "placedDaysAgo": 0 })
    );

    let (status, body) = world
        .post_form("/placement/update", &[("areaId", "area1"), ("placement", &placement)])
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["ok"], true);
    let load = world.read_data("area/load/area1.json");
    assert_eq!(load["placements"].as_array().map(Vec::len), Some(1));
    assert_eq!(load["placements"][0]["Tid"], "thing1");

    let duplicate = urlencoding::encode(r#"{"Id":"pl2","Tid":"thing1"}"#).into_owned();
    let (_, body) = world
        .post_json(
            "/placement/duplicate",
            json!({ "areaId": "area1", "placements": [duplicate, placement] }),
        )
        .await;
    assert_eq!(body, json!({ "ok": true, "count": 2 }));
    let load = world.read_data("area/load/area1.json");
    assert_eq!(load["placements"].as_array().map(Vec::len), Some(2));
    assert_eq!(load["placements"][1]["S"], json!({ "x": 1, "y": 1, "z": 1 }));

    let (_, body) = world
        .post_json("/placement/delete", json!({ "areaId": "area1", "placementId": "pl1" }))
        .await;
    assert_eq!(body, json!({ "ok": true }));
    let load = world.read_data("area/load/area1.json");
    assert_eq!(load["placements"][0]["Id"], "pl2");
    assert!(!world.data_dir.join("placement/info/area1/pl1.json").exists());

    let (status, body) = world
        .post_json("/placement/info", json!({ "areaId": "area1", "placementId": "pl1" }))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body, json!({ "ok": false }));

    let (status, _) = world.post_json("/placement/list", json!({ "areaId": "area1" })).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn placement_save_requires_all_fields() {
    let world = start_world(seed_default).await;
    let (status, body) = world
        .post_json("/placement/save", json!({ "areaId": "area1", "placementId": "pl9" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "ok": false, "error": "Invalid placement data" }));

    let (_, body) = world
        .post_json(
            "/placement/save",
            json!({ "areaId": "area1", "placementId": "pl9", "data": { "Id": "pl9" } }),
        )
        .await;
    assert_eq!(body, json!({ "ok": true }));
    let stored = world.read_data("placement/info/area1/pl9.json");
    assert_eq!(stored["placerName"], "Ada");
}

#[tokio::test]
async fn thing_routes_and_definition_cdn() {
    let world = start_world(|data_dir| {
        seed_default(data_dir);
        write_json(
            &data_dir.join("thing/info/t1.json"),
            json!({ "id": "t1", "vertexCount": 12, "createdAt": "2020-01-01", "definition": { "n": "Chair" } }),
        );
        write_json(&data_dir.join("thing/def/t1.json"), json!({ "n": "Chair" }));
    })
    .await;

    let (status, info) = world.post_json("/thing/info", json!({ "id": "t1" })).await;
    assert_eq!(status, 200);
    assert_eq!(info, json!({ "id": "t1", "vertexCount": 12, "createdAt": "2020-01-01" }));

    let (_, definition) = world.post_json("/thing/definition", json!({ "id": "t1" })).await;
    assert_eq!(definition, json!({ "n": "Chair" }));

    let (status, _) = world.post_json("/thing/info", json!({ "id": "nope" })).await;
    assert_eq!(status, 404);

    let raw = world
        .client
        .get(world.api("/thing/info/t1"))
        .send()
        .await
        .expect("raw info");
    assert_eq!(raw.status().as_u16(), 200);

    let served = world
        .client
        .get(world.thingdefs("/t1"))
        .send()
        .await
        .expect("thingdef");
    assert_eq!(served.json::<Value>().await.expect("json"), json!({ "n": "Chair" }));

    let missing = world
        .client
        .get(world.thingdefs("/unknown"))
        .send()
        .await
        .expect("missing thingdef");
    assert_eq!(missing.status().as_u16(), 200);
    assert_eq!(missing.json::<Value>().await.expect("json"), json!(""));

    let bundle = world
        .client
        .get(world.areabundles("/area1/rrmissing"))
        .send()
        .await
        .expect("bundle");
    assert_eq!(bundle.status().as_u16(), 404);
}

#[tokio::test]
async fn keepalive_health_and_index_status() {
    let world = start_world(seed_default).await;

    let (status, body) = world.post_json("/p", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "vMaj": 188, "vMinSrv": 1 }));

    let health = world
        .client
        .get(world.api("/health"))
        .send()
        .await
        .expect("health")
        .text()
        .await
        .expect("text");
    assert_eq!(health, "ok");

    let status: Value = world
        .client
        .get(world.api("/index/status"))
        .send()
        .await
        .expect("status")
        .json()
        .await
        .expect("json");
    assert_eq!(status["state"], "ready");
    assert_eq!(status["entries"], 1);
    assert_eq!(status["source"], "scan");
}

#[tokio::test]
async fn thing_create_rename_update_and_search() {
    let world = start_world(seed_default).await;

    let (status, created) = world.post_form("/thing", &[("name", "Red Chair")]).await;
    assert_eq!(status, 200);
    let thing_id = created["id"].as_str().expect("thing id").to_string();
    assert_eq!(thing_id.len(), 24);
    let info = world.read_data(&format!("thing/info/{thing_id}.json"));
    assert_eq!(info["creatorId"], "person1");
    assert_eq!(info["creatorName"], "Ada");
    assert_eq!(info["placedCount"], 1);

    write_json(
        &world.data_dir.join(format!("thing/tags/{thing_id}.json")),
        json!({ "tags": ["Red Chair", "seat"] }),
    );
    write_json(
        &world.data_dir.join("placement/info/area1/pl1.json"),
        json!({ "Id": "pl1", "Tid": thing_id, "name": "Red Chair" }),
    );
    write_json(
        &world.data_dir.join("placement/info/area1/pl2.json"),
        json!({ "Id": "pl2", "Tid": "other", "name": "Lamp" }),
    );

    let (status, renamed) = world
        .post_json("/thing/rename", json!({ "thingId": thing_id, "newName": "Blue Stool" }))
        .await;
    assert_eq!(status, 200);
    assert_eq!(renamed, json!({ "ok": true, "name": "Blue Stool" }));
    assert_eq!(world.read_data(&format!("thing/info/{thing_id}.json"))["name"], "Blue Stool");
    assert_eq!(
        world.read_data(&format!("thing/tags/{thing_id}.json"))["tags"],
        json!(["Blue Stool", "seat"])
    );
    assert_eq!(world.read_data("placement/info/area1/pl1.json")["name"], "Blue Stool");
    assert_eq!(world.read_data("placement/info/area1/pl2.json")["name"], "Lamp");

    let (status, body) = world
        .post_json("/thing/rename", json!({ "thingId": "missing", "newName": "X" }))
        .await;
    assert_eq!(status, 404);
    assert_eq!(body, json!({ "ok": false, "error": "Thing not found" }));
    let (status, _) = world
        .post_json("/thing/rename", json!({ "thingId": thing_id }))
        .await;
    assert_eq!(status, 400);

    let (status, body) = world
        .post_json(
            "/thing/updateInfo",
            json!({ "thingId": thing_id, "updates": { "isUnlisted": true, "creatorId": "x" } }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["updated"]["isUnlisted"], true);
    assert_eq!(body["updated"]["creatorId"], "person1");

    let (_, found) = world.post_json("/thing/search", json!({ "query": "stool" })).await;
    assert_eq!(found, json!({ "ids": [] }));

    world
        .post_json(
            "/thing/updateInfo",
            json!({ "thingId": thing_id, "updates": { "isUnlisted": false } }),
        )
        .await;
    let (_, found) = world.post_json("/thing/search", json!({ "query": " STOOL " })).await;
    assert_eq!(found, json!({ "ids": [thing_id.clone()] }));
    let (_, found) = world.post_form("/thing/search", &[("query", "seat")]).await;
    assert_eq!(found, json!({ "ids": [thing_id.clone()] }));
    let (_, found) = world
        .post_json("/thing/search", json!({ "query": "stool", "page": 1 }))
        .await;
    assert_eq!(found, json!({ "ids": [] }));

    let (status, _) = world
        .post_json("/thing/updateInfo", json!({ "thingId": "missing", "updates": {} }))
        .await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn missing_thing_info_is_rebuilt_from_definitions() {
    let world = start_world(|data_dir| {
        seed_default(data_dir);
        write_json(&data_dir.join("thing/def/t1.json"), json!({ "n": "Chair" }));
        write_json(&data_dir.join("thing/def/t2.json"), json!({ "name": "Lamp" }));
        write_json(&data_dir.join("thing/info/t2.json"), json!({ "name": "Lamp" }));
        write_json(&data_dir.join("person/topby/p1.json"), json!({ "ids": ["a", "b", "c", "d", "e"] }));
    })
    .await;

    let (_, body) = world.post_json("/thing/fixmissinginfo", json!({})).await;
    assert_eq!(body, json!({ "ok": true, "created": 1 }));
    assert_eq!(world.read_data("thing/info/t1.json")["name"], "Chair");
    assert_eq!(world.read_data("thing/info/t1.json")["creatorId"], "system");

    let (_, top) = world.post_json("/thing/topby", json!({ "id": "p1", "limit": 2 })).await;
    assert_eq!(top, json!({ "ids": ["a", "b"] }));
    let (_, top) = world.post_json("/thing/topCreatedByPerson", json!({ "id": "p1" })).await;
    assert_eq!(top, json!({ "ids": ["a", "b", "c", "d"] }));
    let (_, top) = world.post_json("/thing/topby", json!({ "id": "nobody" })).await;
    assert_eq!(top, json!({ "ids": [] }));

    let (_, flag) = world.post_json("/thing/getflag", json!({ "id": "t1" })).await;
    assert_eq!(flag, json!({ "isFlagged": false }));
    let (status, _) = world.get_json("/thing/sl/tdef/t1").await;
    assert_eq!(status, 200);
    let (status, _) = world.post_json("/thing/gettags", json!({ "thingId": "t1" })).await;
    assert_eq!(status, 404);
}

#[tokio::test]
async fn session_start_name_change_and_acknowledgements() {
    let world = start_world(seed_default).await;

    for path in ["/person/registerusagemode", "/ach/reg"] {
        let (status, body) = world.post_json(path, json!({})).await;
        assert_eq!(status, 200);
        assert_eq!(body, json!({ "ok": true }));
    }
    let (_, trial) = world.post_json("/extras/startedittoolstrial", json!({})).await;
    assert_eq!(trial["expiryDate"], "3000-04-19T00:07:37.782Z");

    let (status, body) = world.post_form("/user/setName", &[("newName", "Al")]).await;
    assert_eq!(status, 400);
    assert_eq!(body, json!({ "ok": false, "error": "Invalid name" }));
    let (status, body) = world.post_form("/user/setName", &[("newName", "Grace")]).await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "ok": true, "screenName": "Grace" }));
    assert_eq!(world.read_data("person/account.json")["personId"], "person1");

    let response = world
        .client
        .post(world.api("/auth/start"))
        .send()
        .await
        .expect("auth");
    assert_eq!(response.status().as_u16(), 200);
    let cookie = response
        .headers()
        .get("set-cookie")
        .and_then(|value| value.to_str().ok())
        .expect("cookie")
        .to_string();
    assert!(cookie.starts_with("ast=s:"), "{cookie}");
    assert!(cookie.contains("HttpOnly"));
    let profile: Value = response.json().await.expect("profile");
    assert_eq!(profile["screenName"], "Grace");
    assert_eq!(profile["personId"], "person1");
    assert_eq!(profile["attachments"], "{}");
    assert_eq!(profile["hasEditTools"], true);
}

#[tokio::test]
async fn person_cards_settings_and_attachments() {
    let world = start_world(|data_dir| {
        seed_default(data_dir);
        write_json(&data_dir.join("person/gift/person1.json"), json!({ "gifts": [] }));
    })
    .await;

    let (_, card) = world
        .post_json("/person/info", json!({ "areaId": "area1", "userId": "person1" }))
        .await;
    assert_eq!(card["isFriend"], false);
    assert_eq!(card["isOnline"], false);

    let (status, _) = world
        .post_json("/person/updatesetting", json!({ "name": "statusText", "value": "building" }))
        .await;
    assert_eq!(status, 200);
    let (_, card) = world
        .post_json("/person/info", json!({ "areaId": "area1", "userId": "person1" }))
        .await;
    assert_eq!(card, json!({ "statusText": "building" }));
    let (status, body) = world
        .post_json("/person/updatesetting", json!({ "name": "isBanned", "value": true }))
        .await;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "Invalid setting name");

    let (status, _) = world
        .post_form("/person/updateattachment", &[("id", "2"), ("data", r#"{"Tid":"hat"}"#)])
        .await;
    assert_eq!(status, 200);
    assert_eq!(
        world.read_data("person/account.json")["attachments"],
        json!({ "2": { "Tid": "hat" } })
    );
    let (status, _) = world.post_json("/person/updateattachment", json!({})).await;
    assert_eq!(status, 422);

    let (_, gifts) = world.post_json("/gift/getreceived", json!({ "userId": "person1" })).await;
    assert_eq!(gifts, json!({ "gifts": [] }));
    let (_, basic) = world.post_json("/person/infobasic", json!({})).await;
    assert_eq!(basic, json!({ "isEditorHere": false }));
}

#[tokio::test]
async fn inventory_lifecycle() {
    let world = start_world(seed_default).await;

    let ids: Vec<String> = (0..25).map(|n| format!("t{n}")).collect();
    let (status, _) = world.post_json("/inventory/save", json!({ "ids": ids })).await;
    assert_eq!(status, 200);
    let (_, first) = world.get_json("/inventory/0").await;
    assert_eq!(first["inventoryItems"].as_array().map(Vec::len), Some(20));
    let (_, second) = world.get_json("/inventory/1").await;
    assert_eq!(second["inventoryItems"], json!(["t20", "t21", "t22", "t23", "t24"]));
    assert_eq!(
        world.read_data("person/inventory/person1.json")["ids"].as_array().map(Vec::len),
        Some(25)
    );

    world
        .post_form("/inventory/save", &[("page", "0"), ("inventoryItem", r#"{"Tid":"a","C":"red"}"#)])
        .await;
    world
        .post_form("/inventory/update", &[("page", "0"), ("inventoryItem", r#"{"Tid":"a","C":"green"}"#)])
        .await;
    world
        .post_form("/inventory/save", &[("page", "0"), ("inventoryItem", r#"{"Tid":"b"}"#)])
        .await;
    let (_, page) = world.get_json("/inventory/0").await;
    assert_eq!(
        page["inventoryItems"],
        json!([{ "Tid": "a", "C": "green" }, { "Tid": "b" }])
    );

    let (status, _) = world
        .post_json(
            "/inventory/move",
            json!({ "fromPage": 0, "fromIndex": 1, "toPage": 1, "toIndex": 0 }),
        )
        .await;
    assert_eq!(status, 200);
    let (_, moved) = world.get_json("/inventory/1").await;
    assert_eq!(moved["inventoryItems"], json!([{ "Tid": "b" }]));

    let (status, _) = world
        .post_form("/inventory/delete", &[("page", "0"), ("thingId", "a")])
        .await;
    assert_eq!(status, 200);
    let (_, emptied) = world.get_json("/inventory/0").await;
    assert_eq!(emptied["inventoryItems"], json!([]));

    let (status, body) = world.post_json("/inventory/save", json!({})).await;
    assert_eq!(status, 422);
    assert_eq!(body["error"], "Missing ids, id or (page, inventoryItem)");
    let (status, _) = world.post_json("/inventory/delete", json!({ "page": 0 })).await;
    assert_eq!(status, 422);
    let (status, _) = world.post_json("/inventory/move", json!({ "fromPage": 0 })).await;
    assert_eq!(status, 422);
}

#[tokio::test]
async fn home_area_bundle_is_repaired_once() {
    let world = start_world(|data_dir| {
        seed_default(data_dir);
        write_json(
            &data_dir.join("person/account.json"),
            json!({ "personId": "person1", "screenName": "Ada", "homeAreaId": "area1" }),
        );
    })
    .await;

    let response = world
        .client
        .get(world.api("/repair-home-area"))
        .send()
        .await
        .expect("repair");
    assert_eq!(response.status().as_u16(), 200);
    let text = response.text().await.expect("text");
    let key = text
        .strip_prefix("Repaired home area with new key: ")
        .expect("repaired")
        .to_string();
    assert_eq!(world.read_data("area/load/area1.json")["areaKey"], key.as_str());
    assert!(world.data_dir.join(format!("area/bundle/area1/{key}.json")).exists());

    let again = world
        .client
        .get(world.api("/repair-home-area"))
        .send()
        .await
        .expect("repair again")
        .text()
        .await
        .expect("text");
    assert_eq!(again, "Home area is already valid");
}

#[tokio::test]
async fn repair_without_home_area_is_rejected() {
    let world = start_world(seed_default).await;
    let response = world
        .client
        .get(world.api("/repair-home-area"))
        .send()
        .await
        .expect("repair");
    assert_eq!(response.status().as_u16(), 400);
}

#[tokio::test]
async fn area_lists_survive_a_null_field() {
    let world = start_world(|data_dir| {
        seed_default(data_dir);
        write_json(
            &data_dir.join("area/arealist.json"),
            json!({
                "created": [{ "id": "keep", "name": "Keep", "playerCount": 0 }],
                "visited": null,
                "totalAreas": 3,
            }),
        );
    })
    .await;

    world
        .post_json("/area/visit", json!({ "areaId": "area1", "name": "Lobby" }))
        .await;
    let (_, lists) = world.post_json("/area/lists", json!({})).await;
    assert_eq!(lists["created"][0]["id"], "keep");
    assert_eq!(lists["visited"][0]["id"], "area1");
    assert_eq!(lists["totalAreas"], 3);
}

#[tokio::test]
async fn forum_documents_are_served() {
    let world = start_world(|data_dir| {
        seed_default(data_dir);
        write_json(&data_dir.join("forum/forum/f1.json"), json!({ "name": "Builders" }));
    })
    .await;

    let (status, forum) = world.get_json("/forum/forum/f1").await;
    assert_eq!(status, 200);
    assert_eq!(forum, json!({ "name": "Builders" }));
    let (status, thread) = world.get_json("/forum/thread/none").await;
    assert_eq!(status, 404);
    assert_eq!(thread, json!({}));
}
