// The reference geographic dataset: a GeoJSON feature collection of all the villages,
// with the official names and codes in the properties of each feature.

use crate::cunli::*;

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct Properties {
    #[serde(rename = "VILLCODE")]
    villcode: Option<JSValue>,
    #[serde(rename = "COUNTYCODE")]
    countycode: Option<JSValue>,
    #[serde(rename = "TOWNCODE")]
    towncode: Option<JSValue>,
    #[serde(rename = "COUNTYNAME")]
    countyname: Option<String>,
    #[serde(rename = "TOWNNAME")]
    townname: Option<String>,
    #[serde(rename = "VILLNAME")]
    villname: Option<String>,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct Feature {
    properties: Properties,
}

#[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
struct FeatureCollection {
    features: Vec<Feature>,
}

pub fn read_reference(path: &Path) -> CunliResult<Vec<GeoPlace>> {
    let p = path.display().to_string();
    info!("Attempting to read reference dataset {:?}", p);
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path: &p })?;
    let fc: FeatureCollection =
        serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu { path: &p })?;
    let places = places_from_features(&fc.features);
    info!(
        "Loaded {} village codes from {} features",
        places.len(),
        fc.features.len()
    );
    Ok(places)
}

fn places_from_features(features: &[Feature]) -> Vec<GeoPlace> {
    let mut res: Vec<GeoPlace> = Vec::new();
    for f in features.iter() {
        let props = &f.properties;
        // Features without a village name cover unpopulated areas.
        let (Some(villname), Some(villcode)) = (&props.villname, read_js_code(&props.villcode))
        else {
            debug!("places_from_features: skipping {:?}", props);
            continue;
        };
        res.push(GeoPlace {
            villcode,
            countycode: read_js_code(&props.countycode).unwrap_or_default(),
            towncode: read_js_code(&props.towncode).unwrap_or_default(),
            countyname: props.countyname.clone().unwrap_or_default(),
            townname: props.townname.clone().unwrap_or_default(),
            villname: villname.clone(),
        });
    }
    res
}

// Codes are strings in the published files, but tolerate numbers.
fn read_js_code(x: &Option<JSValue>) -> Option<String> {
    match x {
        Some(JSValue::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Some(JSValue::Number(n)) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_features() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("geo.json");
        let js = json!({
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature",
                 "properties": {"VILLCODE": "63000020001", "COUNTYCODE": "63000", "TOWNCODE": "63000020",
                                "COUNTYNAME": "臺北市", "TOWNNAME": "信義區", "VILLNAME": "西村里"},
                 "geometry": {"type": "Polygon", "coordinates": [[[121.5, 25.0], [121.6, 25.0], [121.5, 25.1]]]}},
                {"type": "Feature",
                 "properties": {"VILLCODE": null, "COUNTYCODE": "63000", "TOWNCODE": "63000020",
                                "COUNTYNAME": "臺北市", "TOWNNAME": "信義區", "VILLNAME": null},
                 "geometry": null},
                {"type": "Feature",
                 "properties": {"VILLCODE": 10007010001u64, "COUNTYNAME": "彰化縣",
                                "TOWNNAME": "彰化市", "VILLNAME": "中正里"},
                 "geometry": null}
            ]
        });
        fs::write(&path, js.to_string()).unwrap();
        let places = read_reference(&path).unwrap();
        assert_eq!(places.len(), 2);
        assert_eq!(places[0].villcode, "63000020001");
        assert_eq!(places[0].countyname, "臺北市");
        assert_eq!(places[0].towncode, "63000020");
        assert_eq!(places[1].villcode, "10007010001");
        assert_eq!(places[1].countycode, "");
    }

    #[test]
    fn missing_file() {
        let res = read_reference(Path::new("/nonexistent/geo.json"));
        assert!(matches!(res, Err(CunliError::OpeningJson { .. })));
    }
}
