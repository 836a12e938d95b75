#[cfg(test)]
mod support;

#[cfg(test)]
mod calculator;

#[cfg(test)]
mod ffi_surface;

#[cfg(test)]
mod properties;
