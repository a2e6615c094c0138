//! Shared fixtures for unit tests.

use crate::schema::Schema;

/// A small menagerie: two interfaces, three objects, a union, an enum and an
/// input object.
pub(crate) fn test_schema() -> Schema {
    let json = r#"{"__schema": {
        "queryType": {"name": "Query"},
        "mutationType": {"name": "Mutation"},
        "types": [
            {"kind": "OBJECT", "name": "Query", "fields": [
                {"name": "node", "args": [
                    {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}}
                ], "type": {"kind": "INTERFACE", "name": "Node"}},
                {"name": "pet", "type": {"kind": "INTERFACE", "name": "Pet"}},
                {"name": "dog", "type": {"kind": "NON_NULL", "ofType": {"kind": "OBJECT", "name": "Dog"}}},
                {"name": "pets", "type": {"kind": "NON_NULL", "ofType": {"kind": "LIST", "ofType": {"kind": "NON_NULL", "ofType": {"kind": "INTERFACE", "name": "Pet"}}}}},
                {"name": "search", "args": [
                    {"name": "text", "type": {"kind": "SCALAR", "name": "String"}},
                    {"name": "filter", "type": {"kind": "INPUT_OBJECT", "name": "Filter"}}
                ], "type": {"kind": "LIST", "ofType": {"kind": "NON_NULL", "ofType": {"kind": "UNION", "name": "SearchResult"}}}},
                {"name": "episode", "type": {"kind": "ENUM", "name": "Episode"}},
                {"name": "since", "type": {"kind": "SCALAR", "name": "Date"}}
            ]},
            {"kind": "OBJECT", "name": "Mutation", "fields": [
                {"name": "rename", "args": [
                    {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                    {"name": "name", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}}
                ], "type": {"kind": "INTERFACE", "name": "Pet"}}
            ]},
            {"kind": "INTERFACE", "name": "Node", "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}}
            ]},
            {"kind": "INTERFACE", "name": "Pet", "interfaces": [{"kind": "INTERFACE", "name": "Node"}], "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                {"name": "name", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}}
            ]},
            {"kind": "OBJECT", "name": "Dog",
             "interfaces": [{"kind": "INTERFACE", "name": "Pet"}, {"kind": "INTERFACE", "name": "Node"}],
             "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                {"name": "name", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}},
                {"name": "barkVolume", "type": {"kind": "SCALAR", "name": "Int"}}
            ]},
            {"kind": "OBJECT", "name": "Cat",
             "interfaces": [{"kind": "INTERFACE", "name": "Pet"}, {"kind": "INTERFACE", "name": "Node"}],
             "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                {"name": "name", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "String"}}},
                {"name": "meowVolume", "type": {"kind": "SCALAR", "name": "Int"}}
            ]},
            {"kind": "OBJECT", "name": "Robot",
             "interfaces": [{"kind": "INTERFACE", "name": "Node"}],
             "fields": [
                {"name": "id", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "ID"}}},
                {"name": "model", "type": {"kind": "SCALAR", "name": "String"}}
            ]},
            {"kind": "UNION", "name": "SearchResult", "possibleTypes": [
                {"kind": "OBJECT", "name": "Dog"},
                {"kind": "OBJECT", "name": "Cat"},
                {"kind": "OBJECT", "name": "Robot"}
            ]},
            {"kind": "ENUM", "name": "Episode", "enumValues": [
                {"name": "NEWHOPE"}, {"name": "EMPIRE"}, {"name": "JEDI"}
            ]},
            {"kind": "INPUT_OBJECT", "name": "Filter", "inputFields": [
                {"name": "limit", "type": {"kind": "NON_NULL", "ofType": {"kind": "SCALAR", "name": "Int"}}},
                {"name": "tag", "type": {"kind": "SCALAR", "name": "String"}},
                {"name": "since", "type": {"kind": "SCALAR", "name": "Date"}}
            ]},
            {"kind": "SCALAR", "name": "Date"}
        ]
    }}"#;
    Schema::parse(json).expect("the test schema is valid")
}
