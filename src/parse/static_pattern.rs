use std::{ops::Deref, sync::OnceLock};

use regex::Regex;
use scraper::Selector;

/// A pattern compiled on first use. Every pattern in this crate is a literal,
/// so a compile failure is a programming error and panics.
pub struct StaticPattern<T> {
    cell: OnceLock<T>,
    source: &'static str,
    compile: fn(&'static str) -> T,
}

impl<T> StaticPattern<T> {
    pub const fn new(source: &'static str, compile: fn(&'static str) -> T) -> Self {
        Self {
            cell: OnceLock::new(),
            source,
            compile,
        }
    }
}

impl<T> Deref for StaticPattern<T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.cell.get_or_init(|| (self.compile)(self.source))
    }
}

pub fn compile_selector(source: &'static str) -> Selector {
    match Selector::parse(source) {
        Ok(sel) => sel,
        Err(e) => panic!("Error parsing static selector {source}: {e:?}"),
    }
}

pub fn compile_regex(source: &'static str) -> Regex {
    match Regex::new(source) {
        Ok(re) => re,
        Err(e) => panic!("Error parsing static regex {source}: {e}"),
    }
}

#[macro_export]
macro_rules! static_selector {
    ($x: ident <- $sel: literal) => {
        static $x: $crate::parse::static_pattern::StaticPattern<::scraper::Selector> =
            $crate::parse::static_pattern::StaticPattern::new(
                $sel,
                $crate::parse::static_pattern::compile_selector,
            );
    };
}

#[macro_export]
macro_rules! static_regex {
    ($x: ident <- $re: literal) => {
        static $x: $crate::parse::static_pattern::StaticPattern<::regex::Regex> =
            $crate::parse::static_pattern::StaticPattern::new(
                $re,
                $crate::parse::static_pattern::compile_regex,
            );
    };
}
