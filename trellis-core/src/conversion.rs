//! 类型转换服务
//!
//! 把字符串形式的属性值转换为目标类型。上下文在
//! `finish_bean_factory_initialization` 阶段把名为 `conversionService`
//! 的 Bean 安装到 BeanFactory 上；未安装时使用 `DefaultConversionService`。

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::{ContainerError, ContainerResult};

/// 转换服务
pub trait ConversionService: Send + Sync {
    fn can_convert(&self, target: TypeId) -> bool;

    fn convert(&self, source: &str, target: TypeId) -> ContainerResult<Box<dyn Any + Send>>;
}

type Converter = Arc<dyn Fn(&str) -> ContainerResult<Box<dyn Any + Send>> + Send + Sync>;

/// 默认转换服务，内置常见标量类型
pub struct DefaultConversionService {
    converters: RwLock<HashMap<TypeId, (&'static str, Converter)>>,
}

impl DefaultConversionService {
    pub fn new() -> Self {
        let service = Self {
            converters: RwLock::new(HashMap::new()),
        };
        service.add_parsed::<String>();
        service.add_parsed::<i32>();
        service.add_parsed::<i64>();
        service.add_parsed::<u16>();
        service.add_parsed::<u32>();
        service.add_parsed::<u64>();
        service.add_parsed::<usize>();
        service.add_parsed::<f64>();
        service.add_converter::<bool, _>(|s| match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "on" | "1" => Ok(true),
            "false" | "no" | "off" | "0" => Ok(false),
            other => Err(ContainerError::Configuration(format!(
                "Cannot convert '{}' to bool",
                other
            ))),
        });
        service.add_converter::<Vec<String>, _>(|s| {
            Ok(s.split(',')
                .map(|part| part.trim().to_string())
                .filter(|part| !part.is_empty())
                .collect())
        });
        service
    }

    /// 注册自定义转换器，覆盖同类型的已有转换器
    pub fn add_converter<T, F>(&self, converter: F)
    where
        T: Any + Send,
        F: Fn(&str) -> ContainerResult<T> + Send + Sync + 'static,
    {
        let erased: Converter = Arc::new(move |s| converter(s).map(|v| Box::new(v) as Box<dyn Any + Send>));
        self.converters
            .write()
            .insert(TypeId::of::<T>(), (std::any::type_name::<T>(), erased));
    }

    fn add_parsed<T>(&self)
    where
        T: FromStr + Any + Send,
        T::Err: std::fmt::Display,
    {
        self.add_converter::<T, _>(|s| {
            s.trim().parse::<T>().map_err(|e| {
                ContainerError::Configuration(format!(
                    "Cannot convert '{}' to {}: {}",
                    s,
                    std::any::type_name::<T>(),
                    e
                ))
            })
        });
    }
}

impl Default for DefaultConversionService {
    fn default() -> Self {
        Self::new()
    }
}

impl ConversionService for DefaultConversionService {
    fn can_convert(&self, target: TypeId) -> bool {
        self.converters.read().contains_key(&target)
    }

    fn convert(&self, source: &str, target: TypeId) -> ContainerResult<Box<dyn Any + Send>> {
        let converter = self.converters.read().get(&target).map(|(_, c)| Arc::clone(c));
        match converter {
            Some(converter) => converter(source),
            None => Err(ContainerError::Configuration(format!(
                "No converter registered for target type {:?}",
                target
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert<T: Any + Send>(service: &DefaultConversionService, s: &str) -> ContainerResult<T> {
        service
            .convert(s, TypeId::of::<T>())
            .map(|b| *b.downcast::<T>().unwrap())
    }

    #[test]
    fn test_builtin_conversions() {
        let service = DefaultConversionService::new();
        assert_eq!(convert::<i32>(&service, " 42 ").unwrap(), 42);
        assert!(convert::<bool>(&service, "yes").unwrap());
        assert_eq!(
            convert::<Vec<String>>(&service, "a, b,,c").unwrap(),
            vec!["a", "b", "c"]
        );
        assert!(convert::<u16>(&service, "70000").is_err());
    }

    #[test]
    fn test_custom_converter() {
        #[derive(Debug, PartialEq)]
        struct Port(u16);

        let service = DefaultConversionService::new();
        assert!(!service.can_convert(TypeId::of::<Port>()));
        service.add_converter::<Port, _>(|s| Ok(Port(s.parse().map_err(anyhow::Error::from)?)));
        assert_eq!(convert::<Port>(&service, "8080").unwrap(), Port(8080));
    }
}
