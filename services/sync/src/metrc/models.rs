use serde::{Deserialize, Serialize};

use canopy_reconcile::ExternalLocation;

use crate::tracking::LocationType;

/// Location record as returned by the Metrc `/locations/v1` endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetrcLocation {
    pub id: i64,
    pub name: String,
    pub location_type_id: i64,
    pub location_type_name: String,
    #[serde(default)]
    pub for_plant_batches: bool,
    #[serde(default)]
    pub for_plants: bool,
    #[serde(default)]
    pub for_harvests: bool,
    #[serde(default)]
    pub for_packages: bool,
}

impl From<MetrcLocation> for ExternalLocation {
    fn from(location: MetrcLocation) -> Self {
        ExternalLocation {
            id: location.id,
            name: location.name,
            location_type_id: location.location_type_id,
            location_type_name: location.location_type_name,
        }
    }
}

/// Location type record. The payload also carries usage flags, which room
/// sync has no use for and leaves unmodeled.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetrcLocationType {
    pub id: i64,
    pub name: String,
}

impl From<MetrcLocationType> for LocationType {
    fn from(location_type: MetrcLocationType) -> Self {
        LocationType {
            id: location_type.id,
            name: location_type.name,
        }
    }
}

/// One entry of the `POST /locations/v1/create` body. Metrc takes an array
/// of these and answers with an empty 200, no ids included.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreateLocationRequest {
    pub name: String,
    pub location_type_id: i64,
    pub location_type_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_parses_pascal_case_payload() {
        let location: MetrcLocation = serde_json::from_value(serde_json::json!({
            "Id": 42,
            "Name": "Flower Room A",
            "LocationTypeId": 1,
            "LocationTypeName": "Default Location Type",
            "ForPlantBatches": true,
            "ForPlants": true,
            "ForHarvests": false,
            "ForPackages": true
        }))
        .unwrap();

        assert_eq!(location.id, 42);
        assert_eq!(location.name, "Flower Room A");
        assert_eq!(location.location_type_name, "Default Location Type");
        assert!(location.for_plants);
        assert!(!location.for_harvests);
    }

    #[test]
    fn location_usage_flags_default_to_false() {
        let location: MetrcLocation = serde_json::from_value(serde_json::json!({
            "Id": 7,
            "Name": "Veg 1",
            "LocationTypeId": 1,
            "LocationTypeName": "Default Location Type"
        }))
        .unwrap();

        assert!(!location.for_plant_batches);
        assert!(!location.for_packages);
    }

    #[test]
    fn location_converts_to_external_location() {
        let location = MetrcLocation {
            id: 9,
            name: "Dry Room".to_string(),
            location_type_id: 2,
            location_type_name: "Drying".to_string(),
            for_plant_batches: false,
            for_plants: false,
            for_harvests: true,
            for_packages: false,
        };

        let external = ExternalLocation::from(location);
        assert_eq!(external.id, 9);
        assert_eq!(external.name, "Dry Room");
        assert_eq!(external.location_type_name, "Drying");
    }

    #[test]
    fn location_type_converts_to_contract_type() {
        let location_type: MetrcLocationType = serde_json::from_value(serde_json::json!({
            "Id": 1,
            "Name": "Default Location Type",
            "ForPlantBatches": true
        }))
        .unwrap();

        let contract = LocationType::from(location_type);
        assert_eq!(contract, LocationType {
            id: 1,
            name: "Default Location Type".to_string(),
        });
    }

    #[test]
    fn create_request_serializes_pascal_case() {
        let request = CreateLocationRequest {
            name: "Veg 1".to_string(),
            location_type_id: 1,
            location_type_name: "Default Location Type".to_string(),
        };

        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "Name": "Veg 1",
                "LocationTypeId": 1,
                "LocationTypeName": "Default Location Type"
            })
        );
    }
}
