//! End to end runs of the generation pipeline.

use graphql_typegen::decode_response;
use graphql_typegen::error::DecodeError;
use graphql_typegen::error::GenerateError;
use graphql_typegen::generate;
use graphql_typegen::resolver::Shape;
use graphql_typegen::Schema;
use serde_json_bytes::json;

fn schema() -> Schema {
    let json = r#"{"data": {"__schema": {
        "queryType": {"name": "Query"},
        "types": [
            {"kind": "OBJECT", "name": "Query", "fields": [
                {"name": "node", "args": [
                    {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}}
                ], "type": {"kind": "INTERFACE", "name": "Node"}}
            ]},
            {"kind": "INTERFACE", "name": "Node", "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}}
            ]},
            {"kind": "OBJECT", "name": "Dog", "interfaces": [{"kind": "INTERFACE", "name": "Node"}], "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                {"name": "barkVolume", "type": {"kind": "SCALAR", "name": "Int"}}
            ]},
            {"kind": "OBJECT", "name": "Cat", "interfaces": [{"kind": "INTERFACE", "name": "Node"}], "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                {"name": "meowVolume", "type": {"kind": "SCALAR", "name": "Int"}}
            ]}
        ]
    }}}"#;
    Schema::parse(json).expect("the schema loads")
}

#[test]
fn generate_and_decode_a_polymorphic_query() {
    let schema = schema();
    let generated = generate(
        &schema,
        [(
            "node.graphql",
            "query GetNode($id: ID!) {\n\
               node(id: $id) {\n\
                 id\n\
                 ... on Dog { barkVolume }\n\
                 ... on Cat { meowVolume }\n\
               }\n\
             }",
        )],
    );
    assert!(generated.errors.is_empty(), "{:?}", generated.errors);
    assert_eq!(generated.artifacts.len(), 1);

    let operation = &generated.artifacts[0].operations[0];
    let node = operation
        .selection_set
        .shape
        .common_fields()
        .get("node")
        .expect("the node field resolved");
    let Shape::Polymorphic { common, branches } = &node.selection_set.as_ref().unwrap().shape
    else {
        panic!("expected a polymorphic shape");
    };
    assert!(common.contains_key("__typename"));
    assert!(common.contains_key("id"));
    assert_eq!(branches.keys().collect::<Vec<_>>(), vec!["Dog", "Cat"]);

    let code = &generated.artifacts[0].code;
    assert!(code.contains("pub mod get_node {"));
    assert!(code.contains("#[serde(tag = \"__typename\")]"));
    assert!(code.contains("Dog(ResponseDataNodeOnDog),"));
    assert!(code.contains("Cat(ResponseDataNodeOnCat),"));

    let dog = json!({"node": {"__typename": "Dog", "id": "1", "barkVolume": 11}});
    assert_eq!(decode_response(operation, &dog).unwrap(), dog);

    let cat = json!({"node": {"__typename": "Cat", "id": "2", "meowVolume": 3}});
    assert_eq!(decode_response(operation, &cat).unwrap(), cat);

    // the branch field is required once the discriminator routes to it
    let broken = json!({"node": {"__typename": "Cat", "id": "2"}});
    assert!(matches!(
        decode_response(operation, &broken).unwrap_err(),
        DecodeError::MissingKey { key, .. } if key == "meowVolume"
    ));
}

#[test]
fn one_bad_operation_does_not_discard_its_siblings() {
    let schema = schema();
    let generated = generate(
        &schema,
        [(
            "mixed.graphql",
            "query Good { node(id: 1) { id } }\n\
             query Bad { node(id: 1) { favoriteSnack } }",
        )],
    );
    assert_eq!(generated.artifacts.len(), 1);
    assert_eq!(generated.artifacts[0].operations.len(), 1);
    assert_eq!(
        generated.artifacts[0].operations[0].name.as_deref(),
        Some("Good")
    );
    assert!(matches!(
        &generated.errors[..],
        [GenerateError::Resolution(errors)] if errors.name.as_deref() == Some("Bad")
    ));
}

#[test]
fn mutually_recursive_fragments_are_rejected() {
    let schema = schema();
    let generated = generate(
        &schema,
        [(
            "cycle.graphql",
            "query Q { node(id: 1) { ...A } }\n\
             fragment A on Node { id ...B }\n\
             fragment B on Node { ...A }",
        )],
    );
    assert!(generated.artifacts.is_empty());
    assert!(
        generated
            .errors
            .iter()
            .any(|error| error.to_string().contains("fragment cycle")),
        "{:?}",
        generated.errors
    );
}

#[test]
fn embedded_metadata_round_trips() {
    let schema = schema();
    let generated = generate(
        &schema,
        [("q.graphql", "query Q { node(id: 1) { id } }")],
    );
    let operation = &generated.artifacts[0].operations[0];
    let embedded = serde_json::to_string(operation).unwrap();
    let parsed: graphql_typegen::ResolvedOperation = serde_json::from_str(&embedded).unwrap();
    assert_eq!(&parsed, operation);
}
