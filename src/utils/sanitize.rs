/// Makes a server-supplied value usable as a single path component, so that joining it to a
/// directory can never leave that directory.
pub fn path_component(name: &str) -> String {
	match name {
		"" => String::from("_"),
		"." | ".." => name.replace('.', "_"),
		_ => name.replace(['/', '\\'], "_"),
	}
}
