//! Document records carried opaquely through the gate.

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

/// A goods-introduction document as accepted by the submission endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub description: Description,
    pub doc_id: String,
    pub doc_status: String,
    pub doc_type: String,
    #[serde(rename = "importRequest")]
    pub import_request: bool,
    pub owner_inn: String,
    pub participant_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub production_type: String,
    #[serde(default)]
    pub products: Vec<Product>,
    pub reg_date: NaiveDate,
    pub reg_number: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Description {
    #[serde(rename = "participantInn")]
    pub participant_inn: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_document: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_document_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate_document_number: Option<String>,
    pub owner_inn: String,
    pub producer_inn: String,
    pub production_date: NaiveDate,
    pub tnved_code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uit_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uitu_code: Option<String>,
}

#[cfg(test)]
pub(crate) fn sample() -> Document {
    let date = NaiveDate::from_ymd_opt(2024, 1, 23).unwrap_or_default();
    Document {
        description: Description {
            participant_inn: "7700000000".to_string(),
        },
        doc_id: "doc-1".to_string(),
        doc_status: "DRAFT".to_string(),
        doc_type: "LP_INTRODUCE_GOODS".to_string(),
        import_request: true,
        owner_inn: "7700000001".to_string(),
        participant_inn: "7700000000".to_string(),
        producer_inn: "7700000002".to_string(),
        production_date: date,
        production_type: "OWN_PRODUCTION".to_string(),
        products: vec![Product {
            certificate_document: None,
            certificate_document_date: None,
            certificate_document_number: None,
            owner_inn: "7700000001".to_string(),
            producer_inn: "7700000002".to_string(),
            production_date: date,
            tnved_code: "6401100000".to_string(),
            uit_code: Some("010463003407001221SxMRZbxG1rvRm".to_string()),
            uitu_code: None,
        }],
        reg_date: date,
        reg_number: "R-42".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_uses_endpoint_field_names() {
        let value = serde_json::to_value(sample()).unwrap();

        assert_eq!(value["description"]["participantInn"], "7700000000");
        assert_eq!(value["importRequest"], true);
        assert_eq!(value["production_date"], "2024-01-23");
        assert_eq!(value["products"][0]["tnved_code"], "6401100000");
        assert!(value["products"][0].get("uitu_code").is_none());
    }

    #[test]
    fn test_products_default_to_empty() {
        let json = r#"{
            "description": {"participantInn": "1"},
            "doc_id": "d", "doc_status": "s", "doc_type": "t",
            "importRequest": false,
            "owner_inn": "o", "participant_inn": "p", "producer_inn": "r",
            "production_date": "2020-02-29", "production_type": "x",
            "reg_date": "2020-03-01", "reg_number": "n"
        }"#;

        let doc: Document = serde_json::from_str(json).unwrap();
        assert!(doc.products.is_empty());
        assert!(!doc.import_request);
    }
}
