//! Declarative chart specifications (Vega-Lite v5 JSON) for a [`View`].
//!
//! Only the specification is produced here; rendering belongs to whatever
//! front end consumes the JSON. Data is inlined as `values`.

use crate::error::Result;
use crate::schema::{AGE, AgeBand, COUNTRY, RATE};
use crate::selection::View;
use serde_json::{Value, json};

const SCHEMA_URL: &str = "https://vega.github.io/schema/vega-lite/v5.json";

/// Name of the point selection linking the heatmap to the bar chart.
pub const AGE_SELECTION: &str = "age_sel";

/// Rate colour scale bounds (per 100k), values outside are clamped.
const RATE_DOMAIN: [f64; 2] = [0.01, 1000.0];

fn inline_values(view: &View) -> Result<Value> {
    Ok(serde_json::to_value(view.records())?)
}

fn age_sort_order() -> Vec<&'static str> {
    AgeBand::all().iter().map(|b| b.label()).collect()
}

/// Heatmap of rate by age band and country.
pub fn heatmap_spec(view: &View) -> Result<Value> {
    Ok(json!({
        "$schema": SCHEMA_URL,
        "title": view.title(),
        "data": { "values": inline_values(view)? },
        "mark": "rect",
        "encoding": {
            "x": { "field": "age", "type": "nominal", "sort": age_sort_order(), "title": AGE },
            "y": { "field": "country", "type": "nominal", "title": COUNTRY },
            "color": {
                "field": "rate",
                "type": "quantitative",
                "title": "Mortality rate per 100k",
                "scale": {
                    "type": "log",
                    "domain": RATE_DOMAIN,
                    "clamp": true,
                    "scheme": "blues",
                    "reverse": true
                }
            },
            "tooltip": [{ "field": "rate", "type": "quantitative", "title": RATE }]
        }
    }))
}

/// Bar chart of population per country over every row of the view.
///
/// Stands alone; [`dashboard_spec`] adds the age-selection filter.
pub fn population_bar_spec(view: &View) -> Result<Value> {
    Ok(json!({
        "$schema": SCHEMA_URL,
        "data": { "values": inline_values(view)? },
        "mark": "bar",
        "encoding": {
            "y": { "field": "country", "type": "nominal", "sort": "-x", "title": COUNTRY },
            "x": {
                "aggregate": "sum",
                "field": "pop",
                "type": "quantitative",
                "title": "Sum of population size"
            },
            "tooltip": [
                {
                    "aggregate": "sum",
                    "field": "pop",
                    "type": "quantitative",
                    "title": "Sum of population size",
                    "format": ",d"
                },
                { "field": "country", "type": "nominal", "title": COUNTRY }
            ]
        }
    }))
}

/// Heatmap above the population bars; clicking an age band filters the bars.
/// With nothing selected the bars cover every band.
pub fn dashboard_spec(view: &View) -> Result<Value> {
    let mut heatmap = heatmap_spec(view)?;
    let mut bars = population_bar_spec(view)?;
    for spec in [&mut heatmap, &mut bars] {
        if let Some(obj) = spec.as_object_mut() {
            obj.remove("$schema");
            obj.remove("data");
        }
    }
    // The selection is declared on the heatmap and consumed by the bars.
    if let Some(obj) = heatmap.as_object_mut() {
        obj.insert(
            "params".to_string(),
            json!([{
                "name": AGE_SELECTION,
                "select": { "type": "point", "fields": ["age"] }
            }]),
        );
    }
    if let Some(obj) = bars.as_object_mut() {
        obj.insert(
            "transform".to_string(),
            json!([{ "filter": { "param": AGE_SELECTION, "empty": true } }]),
        );
    }

    Ok(json!({
        "$schema": SCHEMA_URL,
        "data": { "values": inline_values(view)? },
        "vconcat": [heatmap, bars]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Sex;
    use crate::selection::Selection;
    use crate::table::DerivedTable;
    use crate::types::RateRecord;

    fn view() -> View {
        let table = DerivedTable::new(vec![RateRecord {
            country: "Iceland".to_string(),
            year: 2015,
            cancer: "X".to_string(),
            age: AgeBand::Under5,
            sex: Sex::F,
            deaths: 2.0,
            pop: 1000.0,
            rate: 200.0,
        }]);
        Selection {
            year: 2015,
            sex: Sex::F,
            countries: vec!["Iceland".to_string()],
            cancer: "X".to_string(),
        }
        .apply(&table)
    }

    #[test]
    fn test_heatmap_spec() {
        let spec = heatmap_spec(&view()).unwrap();
        assert_eq!(spec["mark"], "rect");
        assert_eq!(spec["title"], "X mortality rates for females in 2015");
        assert_eq!(spec["encoding"]["x"]["sort"][0], "Age <5");
        assert_eq!(spec["encoding"]["x"]["sort"][7], "Age >64");
        assert_eq!(spec["encoding"]["color"]["scale"]["type"], "log");
        assert_eq!(spec["data"]["values"][0]["age"], "Age <5");
        assert_eq!(spec["data"]["values"][0]["rate"], 200.0);
    }

    /// Param names used by a filter but never declared anywhere in the spec.
    fn undeclared_params(spec: &Value) -> Vec<String> {
        fn walk(value: &Value, declared: &mut Vec<String>, used: &mut Vec<String>) {
            match value {
                Value::Object(map) => {
                    if let Some(Value::Array(params)) = map.get("params") {
                        declared.extend(
                            params
                                .iter()
                                .filter_map(|p| p["name"].as_str().map(str::to_string)),
                        );
                    }
                    if let Some(name) = map.get("filter").and_then(|f| f["param"].as_str()) {
                        used.push(name.to_string());
                    }
                    map.values().for_each(|v| walk(v, declared, used));
                }
                Value::Array(items) => items.iter().for_each(|v| walk(v, declared, used)),
                _ => {}
            }
        }

        let (mut declared, mut used) = (Vec::new(), Vec::new());
        walk(spec, &mut declared, &mut used);
        used.retain(|name| !declared.contains(name));
        used
    }

    #[test]
    fn test_population_bar_spec_stands_alone() {
        let spec = population_bar_spec(&view()).unwrap();
        assert_eq!(spec["$schema"], SCHEMA_URL);
        assert_eq!(spec["mark"], "bar");
        assert_eq!(spec["encoding"]["y"]["sort"], "-x");
        assert!(spec.get("transform").is_none());
        assert!(undeclared_params(&spec).is_empty());
        assert!(undeclared_params(&heatmap_spec(&view()).unwrap()).is_empty());
    }

    #[test]
    fn test_dashboard_spec_links_charts() {
        let spec = dashboard_spec(&view()).unwrap();
        let panels = spec["vconcat"].as_array().unwrap();
        assert_eq!(panels.len(), 2);
        assert_eq!(panels[0]["params"][0]["name"], AGE_SELECTION);
        assert_eq!(panels[1]["transform"][0]["filter"]["param"], AGE_SELECTION);
        assert!(panels[1].get("params").is_none());
        assert!(panels[0].get("data").is_none());
        assert!(undeclared_params(&spec).is_empty());
        assert_eq!(spec["data"]["values"].as_array().unwrap().len(), 1);
    }
}
