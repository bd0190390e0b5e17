//! Bean post-processing hooks.
//!
//! A post-processor is a bean whose class implements [`BeanPostProcessor`].
//! Post-processors are created before every ordinary bean and then see each
//! ordinary bean three times:
//!
//! 1. right after creation ([`post_process_before_initialization`]), where
//!    they may substitute the instance, e.g. with a proxy;
//! 2. before injection and init callbacks
//!    ([`post_process_on_set_property`]), where a substituting processor
//!    hands back the original so members are set on the real object;
//! 3. after the init callback ([`post_process_after_initialization`]).
//!
//! [`post_process_before_initialization`]: BeanPostProcessor::post_process_before_initialization
//! [`post_process_on_set_property`]: BeanPostProcessor::post_process_on_set_property
//! [`post_process_after_initialization`]: BeanPostProcessor::post_process_after_initialization

use std::sync::Arc;

use crate::bean::BeanRef;
use crate::descriptor::ClassDescriptor;
use crate::error::Result;
use crate::key::TypeKey;

/// Resolves beans by name while the container is still being built.
///
/// A bean that is not created yet is created on demand.
pub trait BeanResolver {
    fn resolve_bean(&mut self, name: &str) -> Result<BeanRef>;
}

/// Hooks applied to every bean.
///
/// All methods default to returning the bean unchanged.
pub trait BeanPostProcessor: Send + Sync {
    fn post_process_before_initialization(
        &self,
        bean: BeanRef,
        _name: &str,
        _resolver: &mut dyn BeanResolver,
    ) -> Result<BeanRef> {
        Ok(bean)
    }

    fn post_process_after_initialization(&self, bean: BeanRef, _name: &str) -> Result<BeanRef> {
        Ok(bean)
    }

    /// Returns the object that injection and callbacks must target.
    fn post_process_on_set_property(&self, bean: BeanRef, _name: &str) -> BeanRef {
        bean
    }
}

/// Returns `true` if instances of `class` are post-processors.
pub fn is_post_processor(class: &ClassDescriptor) -> bool {
    class.is_assignable_to(&TypeKey::of::<dyn BeanPostProcessor>())
}

/// Views a created bean as a post-processor.
pub(crate) fn as_post_processor(bean: &BeanRef) -> Option<Arc<dyn BeanPostProcessor>> {
    bean.cast::<dyn BeanPostProcessor>()
}
