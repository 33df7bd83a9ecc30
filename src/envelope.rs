// =============================================================================
// ENVELOPE MODULE
// =============================================================================
// Builds the SOAP request for the ERP generic web service.
//
// The ERP exposes a single `run` operation; the actual service is selected
// by `publicName` and its input is a JSON document carried in a CDATA block
// of `inputXml`. Only that JSON varies between calls.
// =============================================================================

use serde_json::{json, Value};

use crate::models::SoapEnvelope;

const ENVELOPE_HEAD: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<soap:Envelope xmlns:soap="http://schemas.xmlsoap.org/soap/envelope/"
  xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance"
  xmlns:ns2="http://www.adonix.com/WSS">
  <soap:Header/>
  <soap:Body>
    <ns2:run soap:encodingStyle="http://schemas.xmlsoap.org/soap/encoding/">
      <callContext>
        <codeLang>FRA</codeLang>
        <poolAlias>XWSBR</poolAlias>
        <poolId xsi:nil="true"/>
        <requestConfig>adxwss.optreturn=JSON</requestConfig>
      </callContext>
      <publicName>XGETSTOCK</publicName>
      <inputXml><![CDATA["#;

const ENVELOPE_TAIL: &str = r#"]]></inputXml>
    </ns2:run>
  </soap:Body>
</soap:Envelope>"#;

/// The JSON document the ERP expects inside `inputXml`.
///
/// `ITMREF` is left out entirely when no item reference was given.
pub fn input_payload(facility_code: &str, item_reference: Option<&str>) -> Value {
    let mut detail = json!({ "STOFCY": facility_code });
    if let Some(item) = item_reference {
        detail["ITMREF"] = Value::String(item.to_string());
    }

    json!({
        "HEADER": { "XOK": 0, "XMESS": "" },
        "DETAILS": [detail],
    })
}

/// Build the SOAP envelope for one stock lookup.
///
/// Serialization goes through `serde_json::Value`, whose maps are ordered,
/// so the same input always produces the same bytes.
pub fn build(facility_code: &str, item_reference: Option<&str>) -> SoapEnvelope {
    let payload = input_payload(facility_code, item_reference).to_string();

    // "]]>" would close the CDATA section early. It can only appear inside a
    // JSON string literal, where the \u003e escape decodes to the same '>'.
    let payload = payload.replace("]]>", "]]\\u003e");

    let mut xml = String::with_capacity(ENVELOPE_HEAD.len() + payload.len() + ENVELOPE_TAIL.len());
    xml.push_str(ENVELOPE_HEAD);
    xml.push_str(&payload);
    xml.push_str(ENVELOPE_TAIL);

    SoapEnvelope::new(xml)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Content of the one CDATA section in the envelope
    fn cdata(envelope: &SoapEnvelope) -> &str {
        let xml = envelope.as_str();
        assert_eq!(xml.matches("<![CDATA[").count(), 1);
        assert_eq!(xml.matches("]]>").count(), 1);

        let start = xml.find("<![CDATA[").unwrap() + "<![CDATA[".len();
        let end = xml.find("]]>").unwrap();
        &xml[start..end]
    }

    #[test]
    fn test_build_embeds_facility_and_item() {
        let envelope = build("BR01", Some("ART-0042"));
        let payload: Value = serde_json::from_str(cdata(&envelope)).unwrap();

        assert_eq!(payload["DETAILS"][0]["STOFCY"], "BR01");
        assert_eq!(payload["DETAILS"][0]["ITMREF"], "ART-0042");
        assert_eq!(payload["HEADER"]["XOK"], 0);
        assert_eq!(payload["HEADER"]["XMESS"], "");
    }

    #[test]
    fn test_build_omits_missing_item_reference() {
        let envelope = build("BR01", None);
        let payload: Value = serde_json::from_str(cdata(&envelope)).unwrap();

        assert_eq!(payload["DETAILS"][0]["STOFCY"], "BR01");
        assert!(payload["DETAILS"][0].get("ITMREF").is_none());
    }

    #[test]
    fn test_build_fixed_skeleton() {
        let envelope = build("BR01", None);
        let xml = envelope.as_str();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<publicName>XGETSTOCK</publicName>"));
        assert!(xml.contains("<poolAlias>XWSBR</poolAlias>"));
        assert!(xml.contains("<requestConfig>adxwss.optreturn=JSON</requestConfig>"));
        assert!(xml.trim_end().ends_with("</soap:Envelope>"));
    }

    #[test]
    fn test_build_is_deterministic() {
        assert_eq!(build("BR01", Some("A")), build("BR01", Some("A")));
    }

    #[test]
    fn test_cdata_terminator_in_input_stays_inside_one_section() {
        let envelope = build("BR]]>01", Some("<tag>&amp;"));
        let payload: Value = serde_json::from_str(cdata(&envelope)).unwrap();

        assert_eq!(payload["DETAILS"][0]["STOFCY"], "BR]]>01");
        assert_eq!(payload["DETAILS"][0]["ITMREF"], "<tag>&amp;");
    }

    #[test]
    fn test_various_facility_codes_round_trip() {
        for code in ["A", "BR01", "é-ü", "with \"quotes\"", "0"] {
            let envelope = build(code, None);
            let payload: Value = serde_json::from_str(cdata(&envelope)).unwrap();
            assert_eq!(payload["DETAILS"][0]["STOFCY"], code);
        }
    }
}
