/// Build a heterogeneous filter list for `filter`, `or_filter`, `having`, ...
///
/// ```ignore
/// let tree = tree.filter(filters! {
///     "status" => "active",
///     "age__between" => [18, 65],
///     "id__in" => vec![1, 2, 3],
/// })?;
/// ```
#[macro_export]
macro_rules! filters {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::FilterValue)>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        ::std::vec![
            $((
                ::std::string::String::from($key),
                $crate::FilterValue::from($value),
            )),+
        ]
    };
}

/// Build a heterogeneous column/value list for inserts and updates.
///
/// ```ignore
/// executor.insert(&tree, changes! { "name" => "Ada", "age" => 36 })?;
/// ```
#[macro_export]
macro_rules! changes {
    () => {
        ::std::vec::Vec::<(::std::string::String, $crate::Value)>::new()
    };
    ($($key:expr => $value:expr),+ $(,)?) => {
        ::std::vec![
            $((
                ::std::string::String::from($key),
                $crate::Value::from($value),
            )),+
        ]
    };
}
