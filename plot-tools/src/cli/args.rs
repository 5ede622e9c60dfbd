pub use clap::{App, Arg};
pub use inflector::Inflector;

#[macro_export]
macro_rules! args_parser {
    ($name:expr) => {{
        $crate::cli::args::App::new($name)
            .version(clap::crate_version!())
            .author(clap::crate_authors!())
    }};
}

#[macro_export]
macro_rules! arg {
    ($name:expr) => {{
        use inflector::Inflector;
        $crate::cli::args::Arg::with_name($name).value_name(&$name.to_screaming_snake_case())
    }};
}

#[macro_export]
macro_rules! opt {
    ($name:expr) => {{
        use inflector::Inflector;
        $crate::cli::args::Arg::with_name($name)
            .long(&$name.to_kebab_case())
            .value_name(&$name.to_screaming_snake_case())
    }};
}

/// A boolean switch: `--kebab-name`, no value.
#[macro_export]
macro_rules! flag {
    ($name:expr) => {{
        use inflector::Inflector;
        $crate::cli::args::Arg::with_name($name).long(&$name.to_kebab_case())
    }};
}

/// Parse `x,y` pairs separated by whitespace or `;`.
pub fn parse_points(s: &str) -> Result<Vec<geo::Coord<f64>>, String> {
    s.split(|c: char| c == ';' || c.is_whitespace())
        .filter(|p| !p.is_empty())
        .map(|p| {
            let mut it = p.split(',').map(|v| v.trim().parse::<f64>());
            match (it.next(), it.next(), it.next()) {
                (Some(Ok(x)), Some(Ok(y)), None) => Ok(geo::Coord { x, y }),
                _ => Err(format!("expected `x,y': got `{}'", p)),
            }
        })
        .collect()
}

/// Parse `a` or `a,b` as a pair; a single value is used for
/// both.
pub fn parse_pair(s: &str) -> Result<(f64, f64), String> {
    let vals = s
        .split(',')
        .map(|v| v.trim().parse::<f64>())
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| format!("`{}': {}", s, e))?;
    match vals.as_slice() {
        [v] => Ok((*v, *v)),
        [a, b] => Ok((*a, *b)),
        _ => Err(format!("expected one or two values: got `{}'", s)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn points() {
        let pts = parse_points("0,10; 10,10 10,0;0,0").unwrap();
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[1], geo::Coord { x: 10., y: 10. });
        assert!(parse_points("0,1,2").is_err());
        assert!(parse_points("a,b").is_err());
    }

    #[test]
    fn pairs() {
        assert_eq!(parse_pair("0.8"), Ok((0.8, 0.8)));
        assert_eq!(parse_pair("0.8, 0.5"), Ok((0.8, 0.5)));
        assert!(parse_pair("1,2,3").is_err());
        assert!(parse_pair("x").is_err());
    }
}
